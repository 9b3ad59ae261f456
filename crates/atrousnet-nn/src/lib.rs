pub mod activation;
pub mod init;
pub mod regularizer;
pub mod padding;
pub mod params;
pub mod layers;
pub mod conv;
pub mod pooling;

pub use activation::*;
pub use init::*;
pub use regularizer::*;
pub use padding::*;
pub use params::*;
pub use layers::*;
pub use conv::*;
pub use pooling::*;

pub mod checkpoint;
pub mod error;
pub mod json;

pub use checkpoint::{load_weights, save_weights, ModelWeights, NamedTensor};
pub use error::{IoError, IoResult};
pub use json::{load_json, save_json};

pub mod tensor;
pub mod shape;
pub mod error;

pub use tensor::Tensor;
pub use shape::Shape;
pub use error::{TensorError, TensorResult};

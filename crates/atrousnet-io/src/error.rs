use atrousnet_core::TensorError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading or writing checkpoints and configs.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("{path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Checkpoint has no parameter named {0:?}")]
    MissingParameter(String),

    #[error(transparent)]
    Tensor(#[from] TensorError),
}

pub type IoResult<T> = Result<T, IoError>;

use atrousnet_core::{Tensor, TensorResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Function turning logits into the `Predictions` end-point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prediction {
    /// Class probabilities normalized over the last axis.
    #[default]
    Softmax,
    /// Independent per-class probabilities.
    Sigmoid,
    /// Logits passed through unchanged.
    Identity,
}

impl Prediction {
    pub const ALL: [Prediction; 3] = [Prediction::Softmax, Prediction::Sigmoid, Prediction::Identity];

    pub fn apply(&self, logits: &Tensor) -> TensorResult<Tensor> {
        match self {
            Prediction::Softmax => logits.softmax(),
            Prediction::Sigmoid => Ok(logits.sigmoid()),
            Prediction::Identity => Ok(logits.clone()),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Prediction::Softmax => "softmax",
            Prediction::Sigmoid => "sigmoid",
            Prediction::Identity => "identity",
        }
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown prediction function {0:?} (expected softmax, sigmoid or identity)")]
pub struct UnknownPrediction(pub String);

impl FromStr for Prediction {
    type Err = UnknownPrediction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Prediction::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownPrediction(s.to_string()))
    }
}

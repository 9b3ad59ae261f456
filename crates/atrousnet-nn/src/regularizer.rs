use atrousnet_core::Tensor;
use serde::{Deserialize, Serialize};

/// Weight penalty contributed to the training loss.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Regularizer {
    /// `scale * sum(w^2) / 2`
    L2 { scale: f64 },
}

impl Regularizer {
    pub fn l2(scale: f64) -> Self {
        Regularizer::L2 { scale }
    }

    /// Penalty strength.
    pub fn scale(&self) -> f64 {
        match *self {
            Regularizer::L2 { scale } => scale,
        }
    }

    pub fn loss(&self, weights: &Tensor) -> f64 {
        match *self {
            Regularizer::L2 { scale } => scale * weights.sum_squares() / 2.0,
        }
    }
}

use atrousnet_core::{Tensor, TensorResult};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Weight initialization scheme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Initializer {
    Zeros,
    Constant { value: f64 },
    /// Normal draws truncated at two standard deviations.
    TruncatedNormal { mean: f64, stddev: f64 },
    /// Uniform in ±sqrt(6 / (fan_in + fan_out)).
    GlorotUniform,
}

impl Initializer {
    pub fn constant(value: f64) -> Self {
        Initializer::Constant { value }
    }

    pub fn truncated_normal(stddev: f64) -> Self {
        Initializer::TruncatedNormal { mean: 0.0, stddev }
    }

    /// Draw a tensor of the given shape.
    pub fn initialize<R: Rng + ?Sized>(
        &self,
        shape: Vec<usize>,
        rng: &mut R,
    ) -> TensorResult<Tensor> {
        match *self {
            Initializer::Zeros => Ok(Tensor::zeros(shape)),
            Initializer::Constant { value } => Ok(Tensor::full(shape, value)),
            Initializer::TruncatedNormal { mean, stddev } => {
                Tensor::truncated_normal(shape, mean, stddev, rng)
            }
            Initializer::GlorotUniform => {
                let (fan_in, fan_out) = fans(&shape);
                let limit = (6.0 / (fan_in + fan_out).max(1) as f64).sqrt();
                Tensor::uniform(shape, -limit, limit, rng)
            }
        }
    }
}

/// Fan-in and fan-out of a weight shape. Convolution kernels are laid out
/// as `[kh, kw, in, out]`, dense weights as `[in, out]`.
pub fn fans(shape: &[usize]) -> (usize, usize) {
    match shape {
        [] => (1, 1),
        [n] => (*n, *n),
        [fan_in, fan_out] => (*fan_in, *fan_out),
        [spatial @ .., fan_in, fan_out] => {
            let receptive: usize = spatial.iter().product();
            (fan_in * receptive, fan_out * receptive)
        }
    }
}

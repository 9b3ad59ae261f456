use crate::error::{TensorError, TensorResult};
use crate::shape::Shape;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Uniform};
use serde::{Deserialize, Serialize};

/// Dense `f64` tensor, the value flowing between AtrousNet layers.
///
/// Stores data in a flat contiguous `Vec<f64>` with row-major (C-order) layout.
/// Image batches use the `[batch, height, width, channels]` convention.
/// `data.len() == shape.numel()` holds for every tensor, including
/// deserialized ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTensor")]
pub struct Tensor {
    data: Vec<f64>,
    shape: Shape,
}

/// Wire form of a [`Tensor`], checked before it becomes one.
#[derive(Deserialize)]
struct RawTensor {
    data: Vec<f64>,
    shape: Shape,
}

impl TryFrom<RawTensor> for Tensor {
    type Error = TensorError;

    fn try_from(raw: RawTensor) -> TensorResult<Self> {
        Tensor::new(raw.data, raw.shape.to_vec())
    }
}

// ─── Construction ───────────────────────────────────────────────────────────

impl Tensor {
    /// Create a tensor from raw data and shape.
    pub fn new(data: Vec<f64>, shape: Vec<usize>) -> TensorResult<Self> {
        let s = Shape::new(shape);
        if data.len() != s.numel() {
            return Err(TensorError::ShapeMismatch {
                expected: s.to_vec(),
                got: vec![data.len()],
            });
        }
        Ok(Tensor { data, shape: s })
    }

    pub fn zeros(shape: Vec<usize>) -> Self {
        Self::full(shape, 0.0)
    }

    pub fn ones(shape: Vec<usize>) -> Self {
        Self::full(shape, 1.0)
    }

    pub fn full(shape: Vec<usize>, value: f64) -> Self {
        let s = Shape::new(shape);
        Tensor {
            data: vec![value; s.numel()],
            shape: s,
        }
    }

    /// Uniform values in [0, 1), seeded when `seed` is given.
    pub fn rand(shape: Vec<usize>, seed: Option<u64>) -> Self {
        let s = Shape::new(shape);
        let mut rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let data = (0..s.numel()).map(|_| rng.gen::<f64>()).collect();
        Tensor { data, shape: s }
    }

    /// Uniform values in [low, high).
    pub fn uniform<R: Rng + ?Sized>(
        shape: Vec<usize>,
        low: f64,
        high: f64,
        rng: &mut R,
    ) -> TensorResult<Self> {
        if !(low < high) {
            return Err(TensorError::InvalidHyperparameter(format!(
                "uniform range must satisfy low < high, got [{}, {})",
                low, high
            )));
        }
        let s = Shape::new(shape);
        let dist = Uniform::new(low, high);
        let data = (0..s.numel()).map(|_| dist.sample(rng)).collect();
        Ok(Tensor { data, shape: s })
    }

    /// Normal draws truncated to two standard deviations around the mean.
    /// Out-of-range draws are redrawn.
    pub fn truncated_normal<R: Rng + ?Sized>(
        shape: Vec<usize>,
        mean: f64,
        stddev: f64,
        rng: &mut R,
    ) -> TensorResult<Self> {
        let dist = Normal::new(mean, stddev).map_err(|e| {
            TensorError::InvalidHyperparameter(format!(
                "normal(mean={}, stddev={}): {}",
                mean, stddev, e
            ))
        })?;
        let bound = 2.0 * stddev;
        let s = Shape::new(shape);
        let data = (0..s.numel())
            .map(|_| loop {
                let v = dist.sample(rng);
                if (v - mean).abs() <= bound {
                    break v;
                }
            })
            .collect();
        Ok(Tensor { data, shape: s })
    }

    // ─── Accessors ──────────────────────────────────────────────────────────

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn shape_vec(&self) -> Vec<usize> {
        self.shape.to_vec()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Remove the given axes, each of which must have size 1.
    pub fn squeeze_axes(&self, axes: &[usize]) -> TensorResult<Tensor> {
        for &axis in axes {
            let size = self.shape.dim(axis)?;
            if size != 1 {
                return Err(TensorError::InvalidOperation(format!(
                    "cannot squeeze axis {} of size {} in tensor of shape {}",
                    axis, size, self.shape
                )));
            }
        }
        let dims: Vec<usize> = self
            .shape
            .dims()
            .iter()
            .enumerate()
            .filter(|(i, _)| !axes.contains(i))
            .map(|(_, &d)| d)
            .collect();
        Ok(Tensor {
            data: self.data.clone(),
            shape: Shape::new(dims),
        })
    }

    /// Element-wise 1 / (1 + exp(-x)).
    pub fn sigmoid(&self) -> Tensor {
        Tensor {
            data: self.data.iter().map(|&x| 1.0 / (1.0 + (-x).exp())).collect(),
            shape: self.shape.clone(),
        }
    }

    pub fn sum_squares(&self) -> f64 {
        self.data.iter().map(|&v| v * v).sum()
    }

    /// Argmax along the last axis, one index per leading position.
    pub fn argmax_last(&self) -> TensorResult<Vec<usize>> {
        let axis_size = self.last_axis()?;
        Ok(self
            .data
            .chunks(axis_size)
            .map(|row| {
                let mut best = 0;
                for (i, &v) in row.iter().enumerate() {
                    if v > row[best] {
                        best = i;
                    }
                }
                best
            })
            .collect())
    }

    /// Softmax along the last axis.
    pub fn softmax(&self) -> TensorResult<Tensor> {
        let axis_size = self.last_axis()?;
        let mut data = self.data.clone();
        for row in data.chunks_mut(axis_size) {
            let max_val = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let mut sum = 0.0;
            for v in row.iter_mut() {
                *v = (*v - max_val).exp();
                sum += *v;
            }
            row.iter_mut().for_each(|v| *v /= sum);
        }
        Ok(Tensor {
            data,
            shape: self.shape.clone(),
        })
    }

    fn last_axis(&self) -> TensorResult<usize> {
        match self.shape.dims().last() {
            Some(&n) if n > 0 => Ok(n),
            _ => Err(TensorError::EmptyTensor),
        }
    }
}

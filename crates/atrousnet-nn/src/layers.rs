use atrousnet_core::{Tensor, TensorError, TensorResult};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::activation::Activation;
use crate::params::FullyConnectedParams;
use crate::regularizer::Regularizer;

/// Trait for a neural network layer.
pub trait Layer {
    /// Scoped layer name, e.g. `CifarNet/conv1`.
    fn name(&self) -> &str;

    /// Forward pass.
    fn forward(&self, input: &Tensor) -> TensorResult<Tensor>;

    /// Trainable parameters keyed by `<name>/weights`, `<name>/biases`.
    fn named_parameters(&self) -> Vec<(String, &Tensor)> {
        Vec::new()
    }

    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Tensor)> {
        Vec::new()
    }

    /// Penalty contributed by the layer's weights regularizer, if any.
    fn regularization_loss(&self) -> Option<f64> {
        None
    }
}

pub(crate) fn weights_and_biases<'a>(
    name: &str,
    weights: &'a Tensor,
    biases: Option<&'a Tensor>,
) -> Vec<(String, &'a Tensor)> {
    let mut params = vec![(format!("{}/weights", name), weights)];
    if let Some(b) = biases {
        params.push((format!("{}/biases", name), b));
    }
    params
}

pub(crate) fn weights_and_biases_mut<'a>(
    name: &str,
    weights: &'a mut Tensor,
    biases: Option<&'a mut Tensor>,
) -> Vec<(String, &'a mut Tensor)> {
    let mut params = vec![(format!("{}/weights", name), weights)];
    if let Some(b) = biases {
        params.push((format!("{}/biases", name), b));
    }
    params
}

/// Fully connected (dense) layer: y = act(xW + b).
///
/// Input `[batch, in_features]`, weights `[in_features, out_features]`.
pub struct FullyConnected {
    pub name: String,
    pub in_features: usize,
    pub out_features: usize,
    pub weights: Tensor,
    pub biases: Option<Tensor>,
    pub weights_regularizer: Option<Regularizer>,
    pub activation: Activation,
}

impl FullyConnected {
    pub fn new<R: Rng + ?Sized>(
        name: impl Into<String>,
        in_features: usize,
        out_features: usize,
        params: &FullyConnectedParams,
        rng: &mut R,
    ) -> TensorResult<Self> {
        if in_features == 0 || out_features == 0 {
            return Err(TensorError::InvalidHyperparameter(format!(
                "fully connected layer needs positive sizes, got {} -> {}",
                in_features, out_features
            )));
        }
        let weights = params
            .weights_initializer
            .initialize(vec![in_features, out_features], rng)?;
        let biases = params
            .biases_initializer
            .map(|init| init.initialize(vec![out_features], rng))
            .transpose()?;

        Ok(FullyConnected {
            name: name.into(),
            in_features,
            out_features,
            weights,
            biases,
            weights_regularizer: params.weights_regularizer,
            activation: params.activation,
        })
    }
}

impl Layer for FullyConnected {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&self, input: &Tensor) -> TensorResult<Tensor> {
        let shape = input.shape_vec();
        if shape.len() != 2 || shape[1] != self.in_features {
            return Err(TensorError::ShapeMismatch {
                expected: vec![shape.first().copied().unwrap_or(0), self.in_features],
                got: shape,
            });
        }
        let batch = shape[0];
        let (k, n) = (self.in_features, self.out_features);
        let x = input.data();
        let w = self.weights.data();

        let mut output = vec![0.0f64; batch * n];
        for (b, out) in output.chunks_mut(n).enumerate() {
            if let Some(bias) = &self.biases {
                out.copy_from_slice(bias.data());
            }
            for (p, &xv) in x[b * k..(b + 1) * k].iter().enumerate() {
                for (o, &wv) in out.iter_mut().zip(&w[p * n..(p + 1) * n]) {
                    *o += xv * wv;
                }
            }
            self.activation.apply_slice(out);
        }

        Tensor::new(output, vec![batch, n])
    }

    fn named_parameters(&self) -> Vec<(String, &Tensor)> {
        weights_and_biases(&self.name, &self.weights, self.biases.as_ref())
    }

    fn named_parameters_mut(&mut self) -> Vec<(String, &mut Tensor)> {
        weights_and_biases_mut(&self.name, &mut self.weights, self.biases.as_mut())
    }

    fn regularization_loss(&self) -> Option<f64> {
        self.weights_regularizer.map(|r| r.loss(&self.weights))
    }
}

/// Dropout layer. Zeroes activations with probability `1 - keep_prob`
/// during training and scales survivors by `1 / keep_prob`.
/// Outside training it returns its input unchanged.
pub struct Dropout {
    pub name: String,
    pub keep_prob: f64,
    pub training: bool,
    rng: Mutex<StdRng>,
}

impl Dropout {
    pub fn new(name: impl Into<String>, keep_prob: f64, seed: Option<u64>) -> TensorResult<Self> {
        if !(keep_prob > 0.0 && keep_prob <= 1.0) {
            return Err(TensorError::InvalidHyperparameter(format!(
                "keep_prob must be in (0, 1], got {}",
                keep_prob
            )));
        }
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Ok(Dropout {
            name: name.into(),
            keep_prob,
            training: false,
            rng: Mutex::new(rng),
        })
    }

    pub fn train(&mut self) { self.training = true; }
    pub fn eval(&mut self) { self.training = false; }
}

impl Layer for Dropout {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&self, input: &Tensor) -> TensorResult<Tensor> {
        if !self.training || self.keep_prob == 1.0 {
            return Ok(input.clone());
        }
        let scale = 1.0 / self.keep_prob;
        let mut rng = self.rng.lock();
        let mut output = input.clone();
        for v in output.data_mut() {
            *v = if rng.gen::<f64>() < self.keep_prob { *v * scale } else { 0.0 };
        }
        Ok(output)
    }
}

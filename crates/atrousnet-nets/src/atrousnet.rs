//! AtrousNet: a CIFAR-style classifier built from dilated (atrous)
//! convolutions.
//!
//! Three unpadded 3x3 convolutions at rates 1, 2 and 4 shrink a 32x32 input
//! to 18x18, a 1x1 convolution widens to 256 channels, dropout and a linear
//! 1x1 convolution map to class scores, and an 18x18 average pool collapses
//! the spatial grid into one logit per class.

use atrousnet_core::{Tensor, TensorError, TensorResult};
use atrousnet_io::{IoError, IoResult, ModelWeights};
use atrousnet_nn::{
    Activation, ArgScope, AvgPool2D, Conv2D, Dropout, Initializer, Layer, Padding,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::arg_scope::{atrousnet_arg_scope, DEFAULT_WEIGHT_DECAY};
use crate::end_points::EndPoints;
use crate::prediction::Prediction;

/// Expected input height and width.
pub const DEFAULT_IMAGE_SIZE: usize = 32;
pub const DEFAULT_NUM_CLASSES: usize = 43;
pub const DEFAULT_SCOPE: &str = "CifarNet";

const POOL_SIZE: usize = 18;

/// Hyperparameters of one AtrousNet build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtrousNetConfig {
    pub num_classes: usize,
    /// Enables dropout.
    pub is_training: bool,
    pub dropout_keep_prob: f64,
    pub prediction: Prediction,
    /// Prefix of every parameter name.
    pub scope: String,
    /// Seed for weight initialization and dropout masks; entropy when absent.
    pub seed: Option<u64>,
    /// Passed to [`atrousnet_arg_scope`] by [`AtrousNetConfig::arg_scope`].
    pub weight_decay: f64,
}

impl Default for AtrousNetConfig {
    fn default() -> Self {
        AtrousNetConfig {
            num_classes: DEFAULT_NUM_CLASSES,
            is_training: false,
            dropout_keep_prob: 0.5,
            prediction: Prediction::Softmax,
            scope: DEFAULT_SCOPE.to_string(),
            seed: None,
            weight_decay: DEFAULT_WEIGHT_DECAY,
        }
    }
}

impl AtrousNetConfig {
    pub fn arg_scope(&self) -> ArgScope {
        atrousnet_arg_scope(self.weight_decay)
    }
}

/// One row of [`AtrousNet::summary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSummary {
    pub name: String,
    /// Output shape without the batch axis.
    pub output_shape: Vec<usize>,
    pub parameters: usize,
}

pub struct AtrousNet {
    scope: String,
    num_classes: usize,
    prediction: Prediction,
    conv1: Conv2D,
    conv2: Conv2D,
    conv3: Conv2D,
    conv4: Conv2D,
    dropout: Dropout,
    conv5: Conv2D,
    avg_pool: AvgPool2D,
}

impl AtrousNet {
    /// Build the network for `in_channels`-channel images and initialize all
    /// weights. Layer settings not fixed by the architecture come from
    /// `arg_scope.conv`.
    pub fn new(in_channels: usize, config: &AtrousNetConfig, arg_scope: &ArgScope) -> TensorResult<Self> {
        let mut rng = match config.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let scoped = |layer: &str| format!("{}/{}", config.scope, layer);
        let defaults = &arg_scope.conv;

        let conv1 = Conv2D::builder(scoped("conv1"), in_channels, 64, (3, 3), defaults)
            .padding(Padding::Valid)
            .weights_regularizer(None)
            .build(&mut rng)?;
        let conv2 = Conv2D::builder(scoped("conv2"), 64, 128, (3, 3), defaults)
            .rate(2)
            .padding(Padding::Valid)
            .weights_regularizer(None)
            .build(&mut rng)?;
        let conv3 = Conv2D::builder(scoped("conv3"), 128, 192, (3, 3), defaults)
            .rate(4)
            .padding(Padding::Valid)
            .weights_regularizer(None)
            .build(&mut rng)?;
        let conv4 = Conv2D::builder(scoped("conv4"), 192, 256, (1, 1), defaults)
            .build(&mut rng)?;

        let mut dropout = Dropout::new(scoped("dropout1"), config.dropout_keep_prob, Some(rng.gen()))?;
        if config.is_training {
            dropout.train();
        }

        let conv5 = Conv2D::builder(scoped("conv5"), 256, config.num_classes, (1, 1), defaults)
            .biases_initializer(Some(Initializer::Zeros))
            .weights_initializer(Initializer::truncated_normal(1.0 / 256.0))
            .weights_regularizer(None)
            .activation(Activation::Identity)
            .build(&mut rng)?;
        let avg_pool = AvgPool2D::new(scoped("avg_pool"), (POOL_SIZE, POOL_SIZE))?;

        let net = AtrousNet {
            scope: config.scope.clone(),
            num_classes: config.num_classes,
            prediction: config.prediction,
            conv1,
            conv2,
            conv3,
            conv4,
            dropout,
            conv5,
            avg_pool,
        };
        log::info!(
            "built {} for {} classes ({} parameters, training={})",
            net.scope,
            net.num_classes,
            net.num_parameters(),
            net.is_training()
        );
        Ok(net)
    }

    /// Run the network on a `[batch, height, width, channels]` batch and
    /// return `[batch, num_classes]` logits with the recorded end-points.
    pub fn forward(&self, images: &Tensor) -> TensorResult<(Tensor, EndPoints)> {
        let conv1 = self.run(&self.conv1, images)?;
        let conv2 = self.run(&self.conv2, &conv1)?;
        let conv3 = self.run(&self.conv3, &conv2)?;
        let conv4 = self.run(&self.conv4, &conv3)?;
        let net = self.run(&self.dropout, &conv4)?;
        let conv5 = self.run(&self.conv5, &net)?;
        let net = self.run(&self.avg_pool, &conv5)?;

        let logits = net.squeeze_axes(&[1, 2])?;
        let predictions = self.prediction.apply(&logits)?;

        let end_points = EndPoints {
            conv1,
            conv2,
            conv3,
            conv4,
            conv5,
            logits: logits.clone(),
            predictions,
        };
        Ok((logits, end_points))
    }

    fn run(&self, layer: &dyn Layer, input: &Tensor) -> TensorResult<Tensor> {
        let output = layer.forward(input)?;
        log::debug!("{}: {} -> {}", layer.name(), input.shape(), output.shape());
        Ok(output)
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn in_channels(&self) -> usize {
        self.conv1.in_channels
    }

    pub fn is_training(&self) -> bool {
        self.dropout.training
    }

    /// Switch dropout on or off. Weights are untouched.
    pub fn set_training(&mut self, training: bool) {
        if training {
            self.dropout.train();
        } else {
            self.dropout.eval();
        }
    }

    pub fn prediction(&self) -> Prediction {
        self.prediction
    }

    pub fn set_prediction(&mut self, prediction: Prediction) {
        self.prediction = prediction;
    }

    fn layers(&self) -> [&dyn Layer; 7] {
        [
            &self.conv1,
            &self.conv2,
            &self.conv3,
            &self.conv4,
            &self.dropout,
            &self.conv5,
            &self.avg_pool,
        ]
    }

    fn convs_mut(&mut self) -> [&mut Conv2D; 5] {
        [
            &mut self.conv1,
            &mut self.conv2,
            &mut self.conv3,
            &mut self.conv4,
            &mut self.conv5,
        ]
    }

    pub fn named_parameters(&self) -> Vec<(String, &Tensor)> {
        self.layers()
            .into_iter()
            .flat_map(|layer| layer.named_parameters())
            .collect()
    }

    pub fn num_parameters(&self) -> usize {
        self.named_parameters().iter().map(|(_, t)| t.numel()).sum()
    }

    /// Penalties of the layers that carry a weights regularizer.
    pub fn regularization_losses(&self) -> Vec<(String, f64)> {
        self.layers()
            .into_iter()
            .filter_map(|layer| layer.regularization_loss().map(|l| (layer.name().to_string(), l)))
            .collect()
    }

    pub fn to_weights(&self) -> ModelWeights {
        self.named_parameters().into_iter().collect()
    }

    /// Replace every parameter with the checkpoint entry of the same name.
    /// Nothing is modified unless all entries are present with matching shapes.
    pub fn load_weights(&mut self, weights: &ModelWeights) -> IoResult<()> {
        let mut staged = Vec::new();
        for (name, current) in self.named_parameters() {
            let loaded = weights.get(&name)?;
            if loaded.shape() != current.shape() {
                return Err(IoError::Tensor(TensorError::ShapeMismatch {
                    expected: current.shape_vec(),
                    got: loaded.shape_vec(),
                }));
            }
            staged.push(loaded);
        }

        let mut staged = staged.into_iter();
        for conv in self.convs_mut() {
            for (_, param) in conv.named_parameters_mut() {
                if let Some(loaded) = staged.next() {
                    *param = loaded;
                }
            }
        }
        log::info!("loaded {} parameter tensors into {}", weights.len(), self.scope);
        Ok(())
    }

    /// Per-layer output shapes for a `height x width` input.
    pub fn summary(&self, height: usize, width: usize) -> TensorResult<Vec<LayerSummary>> {
        let mut rows = Vec::new();
        let (mut h, mut w) = (height, width);
        for conv in [&self.conv1, &self.conv2, &self.conv3, &self.conv4] {
            (h, w) = conv.output_hw(h, w)?;
            rows.push(LayerSummary {
                name: conv.name.clone(),
                output_shape: vec![h, w, conv.filters],
                parameters: conv.num_parameters(),
            });
        }
        rows.push(LayerSummary {
            name: self.dropout.name.clone(),
            output_shape: vec![h, w, self.conv4.filters],
            parameters: 0,
        });
        (h, w) = self.conv5.output_hw(h, w)?;
        rows.push(LayerSummary {
            name: self.conv5.name.clone(),
            output_shape: vec![h, w, self.num_classes],
            parameters: self.conv5.num_parameters(),
        });
        (h, w) = self.avg_pool.output_hw(h, w)?;
        rows.push(LayerSummary {
            name: self.avg_pool.name.clone(),
            output_shape: vec![h, w, self.num_classes],
            parameters: 0,
        });
        if (h, w) != (1, 1) {
            return Err(TensorError::InvalidOperation(format!(
                "{}x{} input pools to {}x{}, not 1x1",
                height, width, h, w
            )));
        }
        Ok(rows)
    }
}

/// Build an AtrousNet for `images` and run one forward pass.
pub fn atrousnet(
    images: &Tensor,
    config: &AtrousNetConfig,
    arg_scope: &ArgScope,
) -> TensorResult<(Tensor, EndPoints)> {
    let (_, _, _, channels) = images.shape().nhwc()?;
    AtrousNet::new(channels, config, arg_scope)?.forward(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(seed: u64) -> AtrousNetConfig {
        AtrousNetConfig {
            num_classes: 10,
            seed: Some(seed),
            ..AtrousNetConfig::default()
        }
    }

    #[test]
    fn test_default_config() {
        let c = AtrousNetConfig::default();
        assert_eq!(c.num_classes, 43);
        assert!(!c.is_training);
        assert_eq!(c.dropout_keep_prob, 0.5);
        assert_eq!(c.prediction, Prediction::Softmax);
        assert_eq!(c.scope, "CifarNet");
    }

    #[test]
    fn test_parameter_names_and_count() {
        let net = AtrousNet::new(3, &AtrousNetConfig { seed: Some(1), ..Default::default() }, &atrousnet_arg_scope(0.004)).unwrap();
        let names: Vec<String> = net.named_parameters().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names.len(), 10);
        assert_eq!(names[0], "CifarNet/conv1/weights");
        assert_eq!(names[9], "CifarNet/conv5/biases");
        // 1792 + 73856 + 221376 + 49408 + 11051
        assert_eq!(net.num_parameters(), 357_483);
    }

    #[test]
    fn test_custom_scope() {
        let config = AtrousNetConfig { scope: "AtrousNet".into(), ..small_config(0) };
        let net = AtrousNet::new(1, &config, &config.arg_scope()).unwrap();
        assert!(net.named_parameters().iter().all(|(n, _)| n.starts_with("AtrousNet/")));
    }

    #[test]
    fn test_conv5_initialization() {
        let net = AtrousNet::new(3, &small_config(2), &atrousnet_arg_scope(0.004)).unwrap();
        assert!(net.conv5.biases.as_ref().unwrap().data().iter().all(|&b| b == 0.0));
        assert!(net.conv5.weights.data().iter().all(|w| w.abs() <= 2.0 / 256.0));
        assert_eq!(net.conv5.activation, Activation::Identity);
        assert_eq!(net.conv1.activation, Activation::Relu);
    }

    #[test]
    fn test_no_conv_is_regularized() {
        let net = AtrousNet::new(3, &small_config(3), &atrousnet_arg_scope(1.0)).unwrap();
        assert!(net.regularization_losses().is_empty());
    }

    #[test]
    fn test_conv_overrides_beat_arg_scope() {
        // A scope that would regularize convolutions is still overridden on
        // conv1, conv2, conv3 and conv5; conv4 keeps the scope default.
        let mut scope = atrousnet_arg_scope(0.004);
        scope.conv.weights_regularizer = Some(atrousnet_nn::Regularizer::l2(0.1));
        let net = AtrousNet::new(3, &small_config(4), &scope).unwrap();
        let names: Vec<String> = net.regularization_losses().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["CifarNet/conv4".to_string()]);
    }

    #[test]
    fn test_summary_for_default_image_size() {
        let net = AtrousNet::new(3, &small_config(5), &atrousnet_arg_scope(0.004)).unwrap();
        let rows = net.summary(DEFAULT_IMAGE_SIZE, DEFAULT_IMAGE_SIZE).unwrap();
        let shapes: Vec<Vec<usize>> = rows.iter().map(|r| r.output_shape.clone()).collect();
        assert_eq!(
            shapes,
            vec![
                vec![30, 30, 64],
                vec![26, 26, 128],
                vec![18, 18, 192],
                vec![18, 18, 256],
                vec![18, 18, 256],
                vec![18, 18, 10],
                vec![1, 1, 10],
            ]
        );
        assert!(net.summary(28, 28).is_err());
        assert!(net.summary(40, 40).is_err());
    }

    #[test]
    fn test_invalid_hyperparameters_surface_layer_errors() {
        let arg_scope = atrousnet_arg_scope(0.004);
        let zero_classes = AtrousNetConfig { num_classes: 0, ..small_config(0) };
        assert!(matches!(
            AtrousNet::new(3, &zero_classes, &arg_scope),
            Err(TensorError::InvalidHyperparameter(_))
        ));
        let bad_keep = AtrousNetConfig { dropout_keep_prob: 0.0, ..small_config(0) };
        assert!(AtrousNet::new(3, &bad_keep, &arg_scope).is_err());
    }

    #[test]
    fn test_config_from_partial_json() {
        let c: AtrousNetConfig =
            serde_json::from_str(r#"{"num_classes": 10, "prediction": "sigmoid"}"#).unwrap();
        assert_eq!(c.num_classes, 10);
        assert_eq!(c.prediction, Prediction::Sigmoid);
        assert_eq!(c.dropout_keep_prob, 0.5);
        assert_eq!(c.scope, "CifarNet");
    }
}

use crate::activation::Activation;
use crate::init::Initializer;
use crate::regularizer::Regularizer;
use serde::{Deserialize, Serialize};

/// Default settings for convolution layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvParams {
    pub weights_initializer: Initializer,
    /// `None` builds the layer without biases.
    pub biases_initializer: Option<Initializer>,
    pub weights_regularizer: Option<Regularizer>,
    pub activation: Activation,
}

impl Default for ConvParams {
    fn default() -> Self {
        ConvParams {
            weights_initializer: Initializer::GlorotUniform,
            biases_initializer: Some(Initializer::Zeros),
            weights_regularizer: None,
            activation: Activation::Relu,
        }
    }
}

/// Default settings for fully connected layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullyConnectedParams {
    pub weights_initializer: Initializer,
    pub biases_initializer: Option<Initializer>,
    pub weights_regularizer: Option<Regularizer>,
    pub activation: Activation,
}

impl Default for FullyConnectedParams {
    fn default() -> Self {
        FullyConnectedParams {
            weights_initializer: Initializer::GlorotUniform,
            biases_initializer: Some(Initializer::Zeros),
            weights_regularizer: None,
            activation: Activation::Relu,
        }
    }
}

/// Per-layer-kind defaults handed to a network's layer builders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArgScope {
    pub conv: ConvParams,
    pub fully_connected: FullyConnectedParams,
}

use atrousnet_nn::{
    Activation, ArgScope, ConvParams, FullyConnectedParams, Initializer, Regularizer,
};

pub const DEFAULT_WEIGHT_DECAY: f64 = 0.004;

/// Layer defaults for AtrousNet.
///
/// Convolutions are never weight-regularized, whatever `weight_decay` is;
/// only the fully connected defaults carry an L2 penalty of `weight_decay`.
pub fn atrousnet_arg_scope(weight_decay: f64) -> ArgScope {
    ArgScope {
        conv: ConvParams {
            weights_initializer: Initializer::truncated_normal(5e-2),
            biases_initializer: Some(Initializer::Zeros),
            weights_regularizer: None,
            activation: Activation::Relu,
        },
        fully_connected: FullyConnectedParams {
            weights_initializer: Initializer::truncated_normal(0.04),
            biases_initializer: Some(Initializer::constant(0.1)),
            weights_regularizer: Some(Regularizer::l2(weight_decay)),
            activation: Activation::Relu,
        },
    }
}

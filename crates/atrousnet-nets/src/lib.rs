//! The AtrousNet image classifier and its layer defaults.

pub mod arg_scope;
pub mod atrousnet;
pub mod end_points;
pub mod prediction;

pub use arg_scope::{atrousnet_arg_scope, DEFAULT_WEIGHT_DECAY};
pub use atrousnet::{
    atrousnet, AtrousNet, AtrousNetConfig, LayerSummary, DEFAULT_IMAGE_SIZE, DEFAULT_NUM_CLASSES,
    DEFAULT_SCOPE,
};
pub use end_points::{EndPoints, END_POINT_NAMES};
pub use prediction::{Prediction, UnknownPrediction};

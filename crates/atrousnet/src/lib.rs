//! # AtrousNet
//!
//! A CIFAR-style image classifier built from dilated convolutions, written in pure Rust.
//!
//! ## Modules
//!
//! - **core**: dense f64 NHWC tensors, softmax/argmax and seeded random constructors
//! - **nn**: Conv2D with dilation, average pooling, dropout, initializers, L2 regularizer
//! - **io**: JSON checkpoints of named parameters
//! - **nets**: the AtrousNet model, its end-points and its arg scope
//!
//! ```no_run
//! use ::atrousnet::core::Tensor;
//! use ::atrousnet::nets::{atrousnet, AtrousNetConfig};
//!
//! let images = Tensor::rand(vec![1, 32, 32, 3], Some(0));
//! let config = AtrousNetConfig::default();
//! let (logits, end_points) = atrousnet(&images, &config, &config.arg_scope()).unwrap();
//! assert_eq!(logits.shape_vec(), vec![1, 43]);
//! assert_eq!(end_points.conv3.shape_vec(), vec![1, 18, 18, 192]);
//! ```

/// Core tensor engine.
pub use atrousnet_core as core;

/// Neural network layers.
pub use atrousnet_nn as nn;

/// Checkpoint I/O.
pub use atrousnet_io as io;

/// The AtrousNet model.
pub use atrousnet_nets as nets;

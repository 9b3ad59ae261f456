use atrousnet_core::{Tensor, TensorError, TensorResult};
use rand::Rng;
use rayon::prelude::*;

use crate::activation::Activation;
use crate::init::Initializer;
use crate::layers::{weights_and_biases, weights_and_biases_mut, Layer};
use crate::padding::Padding;
use crate::params::ConvParams;
use crate::regularizer::Regularizer;

/// 2D convolution with optional dilation (atrous rate).
///
/// Input shape:  [batch, height, width, in_channels]
/// Weights:      [kernel_h, kernel_w, in_channels, filters]
/// Output shape: [batch, out_h, out_w, filters]
pub struct Conv2D {
    pub name: String,
    pub in_channels: usize,
    pub filters: usize,
    pub kernel_size: (usize, usize),
    pub stride: usize,
    pub rate: usize,
    pub padding: Padding,
    pub weights: Tensor,
    pub biases: Option<Tensor>,
    pub weights_regularizer: Option<Regularizer>,
    pub activation: Activation,
}

/// Builder for [`Conv2D`]. Starts from a set of [`ConvParams`] defaults;
/// every setter overrides one of them for this layer only.
pub struct Conv2DBuilder {
    name: String,
    in_channels: usize,
    filters: usize,
    kernel_size: (usize, usize),
    stride: usize,
    rate: usize,
    padding: Padding,
    params: ConvParams,
}

impl Conv2DBuilder {
    pub fn stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }
    pub fn rate(mut self, rate: usize) -> Self {
        self.rate = rate;
        self
    }
    pub fn padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }
    pub fn weights_initializer(mut self, init: Initializer) -> Self {
        self.params.weights_initializer = init;
        self
    }
    pub fn biases_initializer(mut self, init: Option<Initializer>) -> Self {
        self.params.biases_initializer = init;
        self
    }
    pub fn weights_regularizer(mut self, regularizer: Option<Regularizer>) -> Self {
        self.params.weights_regularizer = regularizer;
        self
    }
    pub fn activation(mut self, activation: Activation) -> Self {
        self.params.activation = activation;
        self
    }

    pub fn build<R: Rng + ?Sized>(self, rng: &mut R) -> TensorResult<Conv2D> {
        let (kh, kw) = self.kernel_size;
        if self.in_channels == 0 || self.filters == 0 || kh == 0 || kw == 0 {
            return Err(TensorError::InvalidHyperparameter(format!(
                "{}: channels, filters and kernel size must be positive, got in={} filters={} kernel={}x{}",
                self.name, self.in_channels, self.filters, kh, kw
            )));
        }
        if self.stride == 0 || self.rate == 0 {
            return Err(TensorError::InvalidHyperparameter(format!(
                "{}: stride and rate must be positive, got stride={} rate={}",
                self.name, self.stride, self.rate
            )));
        }
        if self.rate > 1 && self.stride > 1 {
            return Err(TensorError::InvalidHyperparameter(format!(
                "{}: rate {} cannot be combined with stride {}",
                self.name, self.rate, self.stride
            )));
        }

        let weights = self
            .params
            .weights_initializer
            .initialize(vec![kh, kw, self.in_channels, self.filters], rng)?;
        let biases = self
            .params
            .biases_initializer
            .map(|init| init.initialize(vec![self.filters], rng))
            .transpose()?;

        log::debug!(
            "{}: {}x{} conv {} -> {} (rate {}, {:?})",
            self.name, kh, kw, self.in_channels, self.filters, self.rate, self.padding
        );

        Ok(Conv2D {
            name: self.name,
            in_channels: self.in_channels,
            filters: self.filters,
            kernel_size: self.kernel_size,
            stride: self.stride,
            rate: self.rate,
            padding: self.padding,
            weights,
            biases,
            weights_regularizer: self.params.weights_regularizer,
            activation: self.params.activation,
        })
    }
}

impl Conv2D {
    /// Start a layer with stride 1, rate 1 and SAME padding.
    pub fn builder(
        name: impl Into<String>,
        in_channels: usize,
        filters: usize,
        kernel_size: (usize, usize),
        params: &ConvParams,
    ) -> Conv2DBuilder {
        Conv2DBuilder {
            name: name.into(),
            in_channels,
            filters,
            kernel_size,
            stride: 1,
            rate: 1,
            padding: Padding::Same,
            params: params.clone(),
        }
    }

    /// Spatial output size for an `height x width` input.
    pub fn output_hw(&self, height: usize, width: usize) -> TensorResult<(usize, usize)> {
        let (kh, kw) = self.kernel_size;
        let (oh, _) = self.padding.output_size(height, kh, self.stride, self.rate)?;
        let (ow, _) = self.padding.output_size(width, kw, self.stride, self.rate)?;
        Ok((oh, ow))
    }

    pub fn num_parameters(&self) -> usize {
        self.weights.numel() + self.biases.as_ref().map_or(0, |b| b.numel())
    }
}

impl Layer for Conv2D {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&self, input: &Tensor) -> TensorResult<Tensor> {
        let (batch, h, w, c) = input.shape().nhwc()?;
        if c != self.in_channels {
            return Err(TensorError::ShapeMismatch {
                expected: vec![batch, h, w, self.in_channels],
                got: input.shape_vec(),
            });
        }
        let (kh, kw) = self.kernel_size;
        let (out_h, pad_top) = self.padding.output_size(h, kh, self.stride, self.rate)?;
        let (out_w, pad_left) = self.padding.output_size(w, kw, self.stride, self.rate)?;
        let out_c = self.filters;

        let x = input.data();
        let wts = self.weights.data();
        let bias = self.biases.as_ref().map(|b| b.data());
        let image_len = h * w * c;
        let out_image_len = out_h * out_w * out_c;

        let mut output = vec![0.0f64; batch * out_image_len];
        output
            .par_chunks_mut(out_image_len.max(1))
            .enumerate()
            .for_each(|(b, out_img)| {
                let img = &x[b * image_len..(b + 1) * image_len];
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let start = (oh * out_w + ow) * out_c;
                        let acc = &mut out_img[start..start + out_c];
                        if let Some(bias) = bias {
                            acc.copy_from_slice(bias);
                        }
                        for ki in 0..kh {
                            let ih = (oh * self.stride + ki * self.rate) as isize - pad_top as isize;
                            if ih < 0 || ih >= h as isize {
                                continue;
                            }
                            for kj in 0..kw {
                                let iw = (ow * self.stride + kj * self.rate) as isize
                                    - pad_left as isize;
                                if iw < 0 || iw >= w as isize {
                                    continue;
                                }
                                let px = (ih as usize * w + iw as usize) * c;
                                let pixel = &img[px..px + c];
                                let tap = (ki * kw + kj) * c * out_c;
                                for (ic, &xv) in pixel.iter().enumerate() {
                                    let row = &wts[tap + ic * out_c..tap + (ic + 1) * out_c];
                                    for (a, &wv) in acc.iter_mut().zip(row) {
                                        *a += xv * wv;
                                    }
                                }
                            }
                        }
                        self.activation.apply_slice(acc);
                    }
                }
            });

        Tensor::new(output, vec![batch, out_h, out_w, out_c])
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

use atrousnet_core::{Tensor, TensorError, TensorResult};

use crate::layers::Layer;
use crate::padding::Padding;

/// Average Pooling 2D over `[batch, height, width, channels]` input.
///
/// With SAME padding the padded cells are left out of each average.
pub struct AvgPool2D {
    pub name: String,
    pub kernel_size: (usize, usize),
    pub stride: usize,
    pub padding: Padding,
}

impl AvgPool2D {
    /// Pool with the default stride of 2 and VALID padding.
    pub fn new(name: impl Into<String>, kernel_size: (usize, usize)) -> TensorResult<Self> {
        Self::with_options(name, kernel_size, 2, Padding::Valid)
    }

    pub fn with_options(
        name: impl Into<String>,
        kernel_size: (usize, usize),
        stride: usize,
        padding: Padding,
    ) -> TensorResult<Self> {
        let name = name.into();
        if kernel_size.0 == 0 || kernel_size.1 == 0 || stride == 0 {
            return Err(TensorError::InvalidHyperparameter(format!(
                "{}: pooling kernel and stride must be positive, got {:?} / {}",
                name, kernel_size, stride
            )));
        }
        Ok(AvgPool2D { name, kernel_size, stride, padding })
    }

    pub fn output_hw(&self, height: usize, width: usize) -> TensorResult<(usize, usize)> {
        let (oh, _) = self.padding.output_size(height, self.kernel_size.0, self.stride, 1)?;
        let (ow, _) = self.padding.output_size(width, self.kernel_size.1, self.stride, 1)?;
        Ok((oh, ow))
    }
}

impl Layer for AvgPool2D {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&self, input: &Tensor) -> TensorResult<Tensor> {
        let (batch, h, w, c) = input.shape().nhwc()?;
        let (kh, kw) = self.kernel_size;
        let (out_h, pad_top) = self.padding.output_size(h, kh, self.stride, 1)?;
        let (out_w, pad_left) = self.padding.output_size(w, kw, self.stride, 1)?;
        let x = input.data();

        let mut output = vec![0.0f64; batch * out_h * out_w * c];
        for b in 0..batch {
            for oh in 0..out_h {
                let top = (oh * self.stride) as isize - pad_top as isize;
                let h0 = top.max(0) as usize;
                let h1 = ((top + kh as isize) as usize).min(h);
                for ow in 0..out_w {
                    let left = (ow * self.stride) as isize - pad_left as isize;
                    let w0 = left.max(0) as usize;
                    let w1 = ((left + kw as isize) as usize).min(w);

                    let start = ((b * out_h + oh) * out_w + ow) * c;
                    let acc = &mut output[start..start + c];
                    for ih in h0..h1 {
                        for iw in w0..w1 {
                            let px = ((b * h + ih) * w + iw) * c;
                            for (a, &v) in acc.iter_mut().zip(&x[px..px + c]) {
                                *a += v;
                            }
                        }
                    }
                    let count = ((h1 - h0) * (w1 - w0)) as f64;
                    acc.iter_mut().for_each(|a| *a /= count);
                }
            }
        }

        Tensor::new(output, vec![batch, out_h, out_w, c])
    }
}

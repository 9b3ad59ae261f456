use atrousnet_core::{TensorError, TensorResult};
use serde::{Deserialize, Serialize};

/// Border handling for sliding-window layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Padding {
    /// Zero-pad so that `out = ceil(in / stride)`.
    #[default]
    Same,
    /// No padding; windows must fit entirely inside the input.
    Valid,
}

impl Padding {
    /// Output length and leading pad along one spatial axis.
    ///
    /// `rate` spreads the kernel taps apart, giving an effective kernel of
    /// `(kernel - 1) * rate + 1`.
    pub fn output_size(
        self,
        input: usize,
        kernel: usize,
        stride: usize,
        rate: usize,
    ) -> TensorResult<(usize, usize)> {
        let effective = (kernel - 1) * rate + 1;
        match self {
            Padding::Valid => {
                if input < effective {
                    return Err(TensorError::InvalidOperation(format!(
                        "window of size {} does not fit in input of size {} with VALID padding",
                        effective, input
                    )));
                }
                Ok(((input - effective) / stride + 1, 0))
            }
            Padding::Same => {
                let out = input.div_ceil(stride);
                let total = ((out.max(1) - 1) * stride + effective).saturating_sub(input);
                Ok((out, total / 2))
            }
        }
    }
}

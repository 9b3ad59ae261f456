use atrousnet_core::Tensor;

/// Names of the recorded activations, in the order they are produced.
pub const END_POINT_NAMES: [&str; 7] =
    ["conv1", "conv2", "conv3", "conv4", "conv5", "Logits", "Predictions"];

/// Named intermediate outputs of one AtrousNet forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct EndPoints {
    pub conv1: Tensor,
    pub conv2: Tensor,
    pub conv3: Tensor,
    pub conv4: Tensor,
    pub conv5: Tensor,
    pub logits: Tensor,
    pub predictions: Tensor,
}

impl EndPoints {
    /// Look up an end-point by its literal name.
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.iter().find(|(n, _)| *n == name).map(|(_, t)| t)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Tensor)> {
        let tensors = [
            &self.conv1,
            &self.conv2,
            &self.conv3,
            &self.conv4,
            &self.conv5,
            &self.logits,
            &self.predictions,
        ];
        END_POINT_NAMES.into_iter().zip(tensors)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        END_POINT_NAMES.into_iter()
    }
}

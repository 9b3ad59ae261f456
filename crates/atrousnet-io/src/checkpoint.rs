use atrousnet_core::Tensor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{IoError, IoResult};

/// One saved parameter tensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedTensor {
    pub name: String,
    pub shape: Vec<usize>,
    pub data: Vec<f64>,
}

/// Serializable set of named model parameters, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelWeights {
    pub tensors: Vec<NamedTensor>,
}

impl ModelWeights {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tensor, replacing any previous entry with the same name.
    pub fn add(&mut self, name: &str, tensor: &Tensor) {
        let entry = NamedTensor {
            name: name.to_string(),
            shape: tensor.shape_vec(),
            data: tensor.data().to_vec(),
        };
        match self.tensors.iter_mut().find(|t| t.name == name) {
            Some(existing) => *existing = entry,
            None => self.tensors.push(entry),
        }
    }

    pub fn get(&self, name: &str) -> IoResult<Tensor> {
        let entry = self
            .tensors
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| IoError::MissingParameter(name.to_string()))?;
        Ok(Tensor::new(entry.data.clone(), entry.shape.clone())?)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.iter().map(|t| t.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }
}

impl<'a> FromIterator<(String, &'a Tensor)> for ModelWeights {
    fn from_iter<I: IntoIterator<Item = (String, &'a Tensor)>>(iter: I) -> Self {
        let mut weights = ModelWeights::new();
        for (name, tensor) in iter {
            weights.add(&name, tensor);
        }
        weights
    }
}

/// Save model weights to a JSON file.
pub fn save_weights(weights: &ModelWeights, path: impl AsRef<Path>) -> IoResult<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(weights)?;
    fs::write(path, json).map_err(|source| IoError::File {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("saved {} tensors to {}", weights.len(), path.display());
    Ok(())
}

/// Load model weights from a JSON file.
pub fn load_weights(path: impl AsRef<Path>) -> IoResult<ModelWeights> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|source| IoError::File {
        path: path.to_path_buf(),
        source,
    })?;
    let weights: ModelWeights = serde_json::from_str(&json)?;
    log::info!("loaded {} tensors from {}", weights.len(), path.display());
    Ok(weights)
}

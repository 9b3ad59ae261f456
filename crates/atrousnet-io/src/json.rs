use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::error::{IoError, IoResult};

/// Read any serde type from a JSON file.
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> IoResult<T> {
    let path = path.as_ref();
    let json = fs::read_to_string(path).map_err(|source| IoError::File {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&json)?)
}

/// Write any serde type as pretty JSON.
pub fn save_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> IoResult<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(|source| IoError::File {
        path: path.to_path_buf(),
        source,
    })
}

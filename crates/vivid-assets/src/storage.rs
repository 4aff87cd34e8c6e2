//! Persisted key/value storage.
//!
//! A flat JSON file for the small things projects want to keep across
//! runs: calibration values, last-used settings, tweak-mode parameter
//! dumps. Not a scene format.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

/// Errors from storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("storage file '{path}': {source}")]
    Io {
        /// Backing file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The backing file held invalid JSON.
    #[error("storage file '{path}' is not valid JSON: {source}")]
    Parse {
        /// Backing file path.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// JSON-backed key/value store.
pub struct Storage {
    path: PathBuf,
    values: Map<String, Value>,
}

impl Storage {
    /// Opens (or starts) the default store under the user config dir:
    /// `<config>/vivid/storage.json`.
    pub fn open_default() -> Result<Self, StorageError> {
        let dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vivid");
        Self::open(dir.join("storage.json"))
    }

    /// Opens a store at `path`, loading existing contents if present.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let values = if path.is_file() {
            let text = std::fs::read_to_string(&path).map_err(|source| StorageError::Io {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&text).map_err(|source| StorageError::Parse {
                path: path.clone(),
                source,
            })?
        } else {
            Map::new()
        };
        Ok(Self { path, values })
    }

    /// Reads a float value.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(Value::as_f64)
    }

    /// Reads a string value.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Reads a raw JSON value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Writes a float value.
    pub fn set_f64(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), value.into());
    }

    /// Writes a string value.
    pub fn set_str(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), Value::String(value.into()));
    }

    /// Writes a raw JSON value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    /// Removes a key. Returns the removed value, if any.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Writes the store to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Io {
                path: self.path.clone(),
                source,
            })?;
        }
        let text = serde_json::to_string_pretty(&Value::Object(self.values.clone()))
            .expect("maps of JSON values always serialize");
        std::fs::write(&self.path, text).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn roundtrip_through_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/storage.json");

        let mut storage = Storage::open(&path).unwrap();
        storage.set_f64("threshold", 0.75);
        storage.set_str("last_project", "demos/kaleidoscope");
        storage.save().unwrap();

        let reopened = Storage::open(&path).unwrap();
        assert_eq!(reopened.get_f64("threshold"), Some(0.75));
        assert_eq!(reopened.get_str("last_project"), Some("demos/kaleidoscope"));
        assert_eq!(reopened.get_f64("missing"), None);
    }

    #[test]
    fn corrupt_file_is_an_error_not_a_panic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json{").unwrap();
        assert!(matches!(
            Storage::open(&path),
            Err(StorageError::Parse { .. })
        ));
    }
}

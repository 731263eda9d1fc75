//! Named JSON preference stores
//!
//! Small key-value maps persisted as `<dir>/<name>.json`, used for app
//! settings and other state too small to deserve a table. Every mutation
//! rewrites the whole file atomically (write to temp file, then rename).
//!
//! A missing or unreadable file reads as an empty store.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Default store name
pub const DEFAULT_STORE: &str = "data";

/// A single JSON file of key-value pairs
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    /// Store named `name` inside `dir`
    pub fn new(dir: impl AsRef<Path>, name: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", name)),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the value for `key`
    pub fn get(&self, key: &str) -> Option<Value> {
        self.read().remove(key)
    }

    /// Get the value for `key`, or `default` if it is absent
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Check if `key` is present
    pub fn has(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Set `key` to `value`
    pub fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut data = self.read();
        data.insert(key.to_string(), value);
        self.write(&data)
    }

    /// Remove `key`; returns whether it was present
    pub fn delete(&self, key: &str) -> Result<bool> {
        let mut data = self.read();
        let removed = data.remove(key).is_some();
        if removed {
            self.write(&data)?;
        }
        Ok(removed)
    }

    /// Replace the whole store with `data`
    pub fn replace(&self, data: Map<String, Value>) -> Result<()> {
        self.write(&data)
    }

    /// Remove every key
    pub fn clear(&self) -> Result<()> {
        self.write(&Map::new())
    }

    /// Get every key-value pair
    pub fn all(&self) -> Map<String, Value> {
        self.read()
    }

    fn read(&self) -> Map<String, Value> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return Map::new(),
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!(path = %self.path.display(), "Ignoring unreadable preference store");
                Map::new()
            }
        }
    }

    fn write(&self, data: &Map<String, Value>) -> Result<()> {
        let bytes = serde_json::to_vec(data).context("Failed to serialize preference store")?;
        atomic_write(&self.path, &bytes)
            .with_context(|| format!("Failed to save preference store {:?}", self.path))?;
        debug!(path = %self.path.display(), keys = data.len(), "Saved preference store");
        Ok(())
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file = File::create(&temp_path)
        .with_context(|| format!("Failed to create temp file {:?}", temp_path))?;

    file.write_all(data)
        .with_context(|| format!("Failed to write to temp file {:?}", temp_path))?;

    file.sync_all()
        .with_context(|| format!("Failed to sync temp file {:?}", temp_path))?;

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;

    Ok(())
}

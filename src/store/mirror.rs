//! Discovery mirror
//!
//! Other Geode tools locate the install document and the SDK suite through a
//! small key-value store. Writes are best effort: a failing mirror never
//! blocks the installer.

use crate::error::{InstallerError, IoContext, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Key holding the install document location.
pub const KEY_INSTALL_DATA: &str = "install-data-path";

/// Key holding the SDK suite directory.
pub const KEY_SUITE_PATH: &str = "suite-path";

/// Persisted key-value store used for discovery
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// JSON object on disk, one string value per key
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    path: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> BTreeMap<String, String> {
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return BTreeMap::new();
        };
        match serde_json::from_str(&content) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!("Ignoring unreadable discovery file {}: {}", self.path.display(), e);
                BTreeMap::new()
            }
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        if map.is_empty() {
            return match std::fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(InstallerError::io("Failed to remove discovery file", &self.path, e)),
            };
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .io_context("Failed to create discovery directory", parent)?;
        }
        let content = serde_json::to_string_pretty(map)?;
        std::fs::write(&self.path, content).io_context("Failed to write discovery file", &self.path)
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.read_map().remove(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.read_map();
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.read_map();
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

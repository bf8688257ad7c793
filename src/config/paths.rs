//! Per-platform path management
//!
//! Geode keeps its own data directory outside the usual XDG layout so the
//! loader, the CLI and the SDK can all find it:
//! - Windows: %LOCALAPPDATA%\Geode
//! - macOS: /Users/Shared/Geode
//! - Linux: ~/.local/share/Geode

use crate::error::{InstallerError, IoContext, Result};
use directories::{BaseDirs, ProjectDirs};
use std::path::{Path, PathBuf};

/// Name of the Geode data directory.
pub const GEODE_DIR: &str = "Geode";

/// File name of the persisted installation document.
pub const INSTALL_DATA_FILE: &str = "config.json";

/// Manages all installer paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    data_dir: PathBuf,
    config_dir: PathBuf,
    cache_dir: PathBuf,
    home_dir: PathBuf,
    local_data_dir: PathBuf,
}

impl Paths {
    /// Resolve paths for the current user
    pub fn new() -> Result<Self> {
        let base = BaseDirs::new().ok_or_else(|| {
            InstallerError::NotFound("Unable to determine the home directory".to_string())
        })?;
        let project = ProjectDirs::from("", "", "geode-installer").ok_or_else(|| {
            InstallerError::NotFound("Unable to determine project directories".to_string())
        })?;

        let data_dir = if cfg!(target_os = "macos") {
            PathBuf::from("/Users/Shared").join(GEODE_DIR)
        } else {
            base.data_local_dir().join(GEODE_DIR)
        };

        Ok(Self {
            data_dir,
            config_dir: project.config_dir().to_path_buf(),
            cache_dir: project.cache_dir().to_path_buf(),
            home_dir: base.home_dir().to_path_buf(),
            local_data_dir: base.data_local_dir().to_path_buf(),
        })
    }

    /// Relocate everything below a single root
    pub fn rooted(root: &Path) -> Self {
        Self {
            data_dir: root.join("data").join(GEODE_DIR),
            config_dir: root.join("config"),
            cache_dir: root.join("cache"),
            home_dir: root.join("home"),
            local_data_dir: root.join("local"),
        }
    }

    // ========== Data Paths ==========

    /// Geode data directory
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    /// Directory holding the developer CLI
    pub fn bin_dir(&self) -> PathBuf {
        self.data_dir.join("bin")
    }

    /// Default SDK suite directory
    pub fn suite_dir(&self) -> PathBuf {
        self.data_dir.join("suite")
    }

    /// Installation document: <data>/config.json
    pub fn install_data_file(&self) -> PathBuf {
        self.data_dir.join(INSTALL_DATA_FILE)
    }

    /// Log directory: <data>/logs/
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    // ========== Config Paths ==========

    /// Installer config directory
    pub fn config_dir(&self) -> PathBuf {
        self.config_dir.clone()
    }

    /// Installer settings: <config>/installer.toml
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("installer.toml")
    }

    /// Discovery mirror read by other Geode tools
    pub fn discovery_file(&self) -> PathBuf {
        self.config_dir.join("discovery.json")
    }

    // ========== Cache Paths ==========

    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone()
    }

    /// Downloaded release assets
    pub fn downloads_dir(&self) -> PathBuf {
        self.cache_dir.join("downloads")
    }

    // ========== User Paths ==========

    pub fn home_dir(&self) -> PathBuf {
        self.home_dir.clone()
    }

    /// Per-user local application data (%LOCALAPPDATA% on Windows)
    pub fn local_data_dir(&self) -> PathBuf {
        self.local_data_dir.clone()
    }

    // ========== Utility Methods ==========

    /// Ensure directories the installer writes to exist
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.data_dir(),
            self.log_dir(),
            self.config_dir(),
            self.downloads_dir(),
        ] {
            std::fs::create_dir_all(&dir).io_context("Failed to create directory", &dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rooted_layout() {
        let paths = Paths::rooted(Path::new("/tmp/gi"));
        assert_eq!(paths.bin_dir(), PathBuf::from("/tmp/gi/data/Geode/bin"));
        assert_eq!(paths.suite_dir(), PathBuf::from("/tmp/gi/data/Geode/suite"));
        assert_eq!(
            paths.install_data_file(),
            PathBuf::from("/tmp/gi/data/Geode/config.json")
        );
        assert_eq!(
            paths.settings_file(),
            PathBuf::from("/tmp/gi/config/installer.toml")
        );
    }

    #[test]
    fn test_ensure_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Paths::rooted(tmp.path());
        paths.ensure_dirs().unwrap();
        assert!(paths.log_dir().is_dir());
        assert!(paths.downloads_dir().is_dir());
    }
}

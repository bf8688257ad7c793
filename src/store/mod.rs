//! Installation store
//!
//! Durable record of every directory the loader was installed into, the SDK
//! suite state and the default installation. Persisted as JSON:
//!
//! ```json
//! {
//!   "default-installation": 0,
//!   "installations": [
//!     { "path": "...", "executable": "GeometryDash.exe", "version": "v4.0.0", "nightly": false }
//!   ]
//! }
//! ```

mod mirror;

pub use mirror::{FileKeyValueStore, KeyValueStore, KEY_INSTALL_DATA, KEY_SUITE_PATH};

#[cfg(test)]
pub use mirror::MockKeyValueStore;

use crate::config::{Paths, SUITE_ENV_VAR};
use crate::error::{InstallerError, IoContext, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Release channel an installation follows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Branch {
    #[default]
    Stable,
    Nightly,
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Stable => "stable",
            Branch::Nightly => "nightly",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Branch::Stable => "Stable",
            Branch::Nightly => "Nightly",
        }
    }

    pub fn is_nightly(&self) -> bool {
        matches!(self, Branch::Nightly)
    }
}

/// One directory the loader lives in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    /// Directory holding the loader files; identity of the record
    pub path: PathBuf,

    /// File name of the game executable (or app bundle) that was selected
    pub executable: String,

    /// Loader release tag
    pub version: String,

    pub branch: Branch,
}

impl Installation {
    pub fn new(
        path: impl Into<PathBuf>,
        executable: impl Into<String>,
        version: impl Into<String>,
        branch: Branch,
    ) -> Self {
        Self {
            path: path.into(),
            executable: executable.into(),
            version: version.into(),
            branch,
        }
    }

    /// Executable name without its extension
    pub fn executable_stem(&self) -> &str {
        Path::new(&self.executable)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.executable)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct InstallDocument {
    #[serde(
        rename = "default-installation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    default_installation: Option<usize>,

    #[serde(default)]
    installations: Vec<InstallationRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct InstallationRecord {
    path: String,
    #[serde(alias = "exe")]
    executable: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    nightly: bool,
}

impl From<&Installation> for InstallationRecord {
    fn from(inst: &Installation) -> Self {
        Self {
            path: inst.path.to_string_lossy().into_owned(),
            executable: inst.executable.clone(),
            version: inst.version.clone(),
            nightly: inst.branch.is_nightly(),
        }
    }
}

impl From<InstallationRecord> for Installation {
    fn from(rec: InstallationRecord) -> Self {
        Installation {
            path: PathBuf::from(rec.path),
            executable: rec.executable,
            version: rec.version,
            branch: if rec.nightly {
                Branch::Nightly
            } else {
                Branch::Stable
            },
        }
    }
}

/// Owner of all installation records
pub struct InstallationStore {
    paths: Paths,
    mirror: Box<dyn KeyValueStore>,
    suite_directory: PathBuf,
    installations: Vec<Installation>,
    default_installation: usize,
    suite_installed: bool,
    data_loaded: bool,
}

impl std::fmt::Debug for InstallationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationStore")
            .field("data_directory", &self.paths.data_dir())
            .field("suite_directory", &self.suite_directory)
            .field("installations", &self.installations)
            .field("default_installation", &self.default_installation)
            .field("suite_installed", &self.suite_installed)
            .field("data_loaded", &self.data_loaded)
            .finish()
    }
}

impl InstallationStore {
    /// Create an empty store in first-time state
    pub fn new(paths: Paths, mirror: Box<dyn KeyValueStore>) -> Self {
        let suite_directory = paths.suite_dir();
        Self {
            paths,
            mirror,
            suite_directory,
            installations: Vec::new(),
            default_installation: 0,
            suite_installed: false,
            data_loaded: false,
        }
    }

    /// Load the document, honouring the suite environment variable
    pub fn load(&mut self) -> Result<()> {
        let env_suite = std::env::var(SUITE_ENV_VAR).ok();
        self.load_with_env(env_suite)
    }

    /// Load the document with an explicit suite override.
    ///
    /// A missing document leaves the store in first-time state. A malformed
    /// one clears every record and returns `Parse`; the store stays usable.
    pub fn load_with_env(&mut self, env_suite: Option<String>) -> Result<()> {
        self.installations.clear();
        self.default_installation = 0;
        self.data_loaded = false;
        self.suite_directory = self.paths.suite_dir();
        self.suite_installed = false;

        if let Some(dir) = env_suite.filter(|d| !d.trim().is_empty()) {
            self.suite_directory = PathBuf::from(dir.trim());
            self.suite_installed = true;
        }

        let doc_path = self.paths.install_data_file();
        let content = match std::fs::read_to_string(&doc_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No install data at {}, first run", doc_path.display());
                return Ok(());
            }
            Err(e) => return Err(InstallerError::io("Failed to read install data", &doc_path, e)),
        };

        let doc: InstallDocument = serde_json::from_str(&content)
            .map_err(|e| InstallerError::Parse(format!("install data: {}", e)))?;

        self.installations = doc.installations.into_iter().map(Installation::from).collect();
        self.default_installation = match doc.default_installation {
            Some(i) if i < self.installations.len() => i,
            _ => 0,
        };
        self.data_loaded = true;

        tracing::info!(
            installations = self.installations.len(),
            suite_installed = self.suite_installed,
            "Loaded install data"
        );
        Ok(())
    }

    /// Write the document and refresh the discovery mirror
    pub fn save(&mut self) -> Result<()> {
        let doc_path = self.paths.install_data_file();
        if let Some(parent) = doc_path.parent() {
            std::fs::create_dir_all(parent).io_context("Failed to create data directory", parent)?;
        }

        let doc = InstallDocument {
            default_installation: (!self.installations.is_empty())
                .then_some(self.default_installation),
            installations: self.installations.iter().map(InstallationRecord::from).collect(),
        };
        let content = serde_json::to_string_pretty(&doc)?;
        std::fs::write(&doc_path, content).io_context("Failed to write install data", &doc_path)?;
        self.data_loaded = true;

        if let Err(e) = self
            .mirror
            .set(KEY_INSTALL_DATA, &doc_path.to_string_lossy())
        {
            tracing::warn!("Could not mirror install data location: {}", e);
        }
        if self.suite_installed {
            if let Err(e) = self
                .mirror
                .set(KEY_SUITE_PATH, &self.suite_directory.to_string_lossy())
            {
                tracing::warn!("Could not mirror suite location: {}", e);
            }
        }

        tracing::info!("Saved install data to {}", doc_path.display());
        Ok(())
    }

    /// Remove the document and the discovery mirror. Absence is success.
    pub fn delete(&mut self) -> Result<()> {
        let doc_path = self.paths.install_data_file();
        match std::fs::remove_file(&doc_path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(InstallerError::io("Failed to delete install data", &doc_path, e)),
        }

        for key in [KEY_INSTALL_DATA, KEY_SUITE_PATH] {
            if let Err(e) = self.mirror.remove(key) {
                tracing::warn!("Could not clear discovery key {}: {}", key, e);
            }
        }

        self.installations.clear();
        self.default_installation = 0;
        self.data_loaded = false;
        tracing::info!("Deleted install data");
        Ok(())
    }

    /// Insert a record, or replace the one with the same path in place.
    /// Returns the record's index.
    pub fn add_or_update(&mut self, installation: Installation) -> usize {
        if let Some(index) = self.position(&installation.path) {
            tracing::debug!("Updating installation {}", installation.path.display());
            self.installations[index] = installation;
            return index;
        }

        tracing::debug!("Adding installation {}", installation.path.display());
        let was_empty = self.installations.is_empty();
        self.installations.push(installation);
        if was_empty {
            self.default_installation = 0;
        }
        self.installations.len() - 1
    }

    /// Drop the record for `path`, keeping the default pointing at the same
    /// record where possible
    pub fn forget(&mut self, path: &Path) -> Option<Installation> {
        let index = self.position(path)?;
        let removed = self.installations.remove(index);
        if index < self.default_installation {
            self.default_installation -= 1;
        } else if self.default_installation >= self.installations.len() {
            self.default_installation = 0;
        }
        Some(removed)
    }

    pub fn installations(&self) -> &[Installation] {
        &self.installations
    }

    pub fn find(&self, path: &Path) -> Option<&Installation> {
        self.installations.iter().find(|i| i.path == path)
    }

    fn position(&self, path: &Path) -> Option<usize> {
        self.installations.iter().position(|i| i.path == path)
    }

    pub fn default_installation(&self) -> Option<&Installation> {
        self.installations.get(self.default_installation)
    }

    pub fn default_index(&self) -> Option<usize> {
        (!self.installations.is_empty()).then_some(self.default_installation)
    }

    pub fn set_default_installation(&mut self, index: usize) -> Result<()> {
        if index >= self.installations.len() {
            return Err(InstallerError::NotFound(format!(
                "No installation at index {}",
                index
            )));
        }
        self.default_installation = index;
        Ok(())
    }

    /// True until a document was read or written this session
    pub fn is_first_time(&self) -> bool {
        !self.data_loaded
    }

    pub fn data_directory(&self) -> PathBuf {
        self.paths.data_dir()
    }

    pub fn bin_directory(&self) -> PathBuf {
        self.paths.bin_dir()
    }

    pub fn suite_directory(&self) -> &Path {
        &self.suite_directory
    }

    pub fn suite_installed(&self) -> bool {
        self.suite_installed
    }

    /// Record where the SDK suite lives and whether it is present
    pub fn set_suite(&mut self, directory: PathBuf, installed: bool) {
        self.suite_directory = directory;
        self.suite_installed = installed;
        if !installed {
            if let Err(e) = self.mirror.remove(KEY_SUITE_PATH) {
                tracing::warn!("Could not clear suite discovery key: {}", e);
            }
        }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(root: &Path) -> InstallationStore {
        let paths = Paths::rooted(root);
        let mirror = FileKeyValueStore::new(paths.discovery_file());
        InstallationStore::new(paths, Box::new(mirror))
    }

    fn inst(path: &str, version: &str) -> Installation {
        Installation::new(path, "GeometryDash.exe", version, Branch::Stable)
    }

    #[test]
    fn test_missing_document_is_first_time() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_in(tmp.path());
        store.load_with_env(None).unwrap();
        assert!(store.is_first_time());
        assert!(store.installations().is_empty());
        assert!(!store.suite_installed());
    }

    #[test]
    fn test_add_or_update_keeps_one_per_path() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_in(tmp.path());

        assert_eq!(store.add_or_update(inst("/games/a", "v1")), 0);
        assert_eq!(store.add_or_update(inst("/games/b", "v1")), 1);
        assert_eq!(store.add_or_update(inst("/games/c", "v1")), 2);
        assert_eq!(store.add_or_update(inst("/games/b", "v2")), 1);

        let paths: Vec<_> = store.installations().iter().map(|i| i.path.clone()).collect();
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/games/a"),
                PathBuf::from("/games/b"),
                PathBuf::from("/games/c")
            ]
        );
        assert_eq!(store.installations()[1].version, "v2");
    }

    #[test]
    fn test_first_entry_becomes_default() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_in(tmp.path());
        assert_eq!(store.default_index(), None);

        store.add_or_update(inst("/games/a", "v1"));
        assert_eq!(store.default_index(), Some(0));
        store.add_or_update(inst("/games/b", "v1"));
        store.set_default_installation(1).unwrap();
        assert_eq!(
            store.default_installation().map(|i| i.path.clone()),
            Some(PathBuf::from("/games/b"))
        );
        assert!(store.set_default_installation(2).is_err());
    }

    #[test]
    fn test_save_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_in(tmp.path());
        store.add_or_update(inst("/games/a", "v1.0.0"));
        store.add_or_update(Installation::new(
            "/games/b",
            "GeometryDash.exe",
            "v2.0.0-beta.1",
            Branch::Nightly,
        ));
        store.set_default_installation(1).unwrap();
        store.save().unwrap();

        let mut reloaded = store_in(tmp.path());
        reloaded.load_with_env(None).unwrap();
        assert!(!reloaded.is_first_time());
        assert_eq!(reloaded.installations(), store.installations());
        assert_eq!(reloaded.default_index(), Some(1));
    }

    #[test]
    fn test_save_omits_default_when_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_in(tmp.path());
        store.save().unwrap();
        let content = std::fs::read_to_string(Paths::rooted(tmp.path()).install_data_file()).unwrap();
        assert!(!content.contains("default-installation"));
        assert!(content.contains("\"installations\": []"));
    }

    #[test]
    fn test_legacy_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Paths::rooted(tmp.path());
        std::fs::create_dir_all(paths.data_dir()).unwrap();
        std::fs::write(
            paths.install_data_file(),
            r#"{"default-installation": 7, "installations": [{"path": "/g", "exe": "GeometryDash.exe"}]}"#,
        )
        .unwrap();

        let mut store = store_in(tmp.path());
        store.load_with_env(None).unwrap();
        let loaded = &store.installations()[0];
        assert_eq!(loaded.executable, "GeometryDash.exe");
        assert_eq!(loaded.version, "");
        assert_eq!(loaded.branch, Branch::Stable);
        assert_eq!(store.default_index(), Some(0));
    }

    #[test]
    fn test_corrupt_document() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = Paths::rooted(tmp.path());
        std::fs::create_dir_all(paths.data_dir()).unwrap();
        std::fs::write(paths.install_data_file(), "{\"installations\": [").unwrap();

        let mut store = store_in(tmp.path());
        store.add_or_update(inst("/stale", "v0"));
        let err = store.load_with_env(None).unwrap_err();
        assert!(matches!(err, InstallerError::Parse(_)));
        assert!(store.is_first_time());
        assert!(store.installations().is_empty());

        // still usable afterwards
        store.add_or_update(inst("/games/a", "v1"));
        store.save().unwrap();
    }

    #[test]
    fn test_suite_env_override() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_in(tmp.path());
        store.load_with_env(Some("/opt/geode-suite".to_string())).unwrap();
        assert!(store.suite_installed());
        assert_eq!(store.suite_directory(), Path::new("/opt/geode-suite"));

        store.load_with_env(Some("  ".to_string())).unwrap();
        assert!(!store.suite_installed());
        assert_eq!(store.suite_directory(), Paths::rooted(tmp.path()).suite_dir());
    }

    #[test]
    fn test_forget_adjusts_default() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_in(tmp.path());
        store.add_or_update(inst("/a", "v1"));
        store.add_or_update(inst("/b", "v1"));
        store.add_or_update(inst("/c", "v1"));
        store.set_default_installation(2).unwrap();

        store.forget(Path::new("/a")).unwrap();
        assert_eq!(
            store.default_installation().map(|i| i.path.clone()),
            Some(PathBuf::from("/c"))
        );
        store.forget(Path::new("/c")).unwrap();
        assert_eq!(store.default_index(), Some(0));
        assert!(store.forget(Path::new("/missing")).is_none());
    }

    #[test]
    fn test_delete_removes_document() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = store_in(tmp.path());
        store.add_or_update(inst("/a", "v1"));
        store.save().unwrap();
        let doc = Paths::rooted(tmp.path()).install_data_file();
        assert!(doc.exists());

        store.delete().unwrap();
        assert!(!doc.exists());
        assert!(store.installations().is_empty());
        // deleting twice is fine
        store.delete().unwrap();
    }

    #[test]
    fn test_mirror_failures_are_not_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let mut mirror = MockKeyValueStore::new();
        mirror
            .expect_set()
            .returning(|_, _| Err(InstallerError::PlatformUnsupported("mirror".into())));
        mirror
            .expect_remove()
            .returning(|_| Err(InstallerError::PlatformUnsupported("mirror".into())));

        let mut store = InstallationStore::new(Paths::rooted(tmp.path()), Box::new(mirror));
        store.set_suite(PathBuf::from("/suite"), true);
        store.add_or_update(inst("/a", "v1"));
        store.save().unwrap();
        store.delete().unwrap();
    }

    #[test]
    fn test_save_mirrors_locations() {
        let tmp = tempfile::tempdir().unwrap();
        let mut mirror = MockKeyValueStore::new();
        mirror
            .expect_set()
            .withf(|key, _| key.to_string() == KEY_INSTALL_DATA)
            .times(1)
            .returning(|_, _| Ok(()));
        mirror
            .expect_set()
            .withf(|key, value| key.to_string() == KEY_SUITE_PATH && value.to_string() == "/suite")
            .times(1)
            .returning(|_, _| Ok(()));

        let mut store = InstallationStore::new(Paths::rooted(tmp.path()), Box::new(mirror));
        store.set_suite(PathBuf::from("/suite"), true);
        store.save().unwrap();
    }
}

//! Installer configuration
//!
//! Settings live in `installer.toml` inside the installer config directory.
//! A missing file is created with defaults on first load.

mod paths;

pub use paths::{Paths, GEODE_DIR, INSTALL_DATA_FILE};

use crate::error::{IoContext, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

/// Environment variable naming the SDK suite directory.
pub const SUITE_ENV_VAR: &str = "GEODE_SUITE";

/// Main settings structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Release source settings
    pub github: GitHubSettings,

    /// Minimum interval between forwarded progress updates, in milliseconds
    pub progress_interval_ms: u64,

    /// Override for the release asset identifier ("win", "mac")
    pub asset_identifier: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            github: GitHubSettings::default(),
            progress_interval_ms: 300,
            asset_identifier: None,
        }
    }
}

/// Where releases are fetched from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubSettings {
    /// REST API base URL
    pub api_base: String,

    /// Repository owner
    pub owner: String,

    /// Loader repository name
    pub loader_repo: String,

    /// API mod repository name
    pub api_repo: String,

    /// CLI repository name
    pub cli_repo: String,

    /// User agent sent with each request
    pub user_agent: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GitHubSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            owner: "geode-sdk".to_string(),
            loader_repo: "loader".to_string(),
            api_repo: "api".to_string(),
            cli_repo: "cli".to_string(),
            user_agent: format!("geode-installer/{}", crate::APP_VERSION),
            timeout_secs: 60,
        }
    }
}

impl Settings {
    /// Load settings from disk or create defaults
    pub async fn load(paths: &Paths) -> Result<Self> {
        let settings_path = paths.settings_file();

        if fs::try_exists(&settings_path).await.unwrap_or(false) {
            let content = fs::read_to_string(&settings_path)
                .await
                .io_context("Failed to read settings file", &settings_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            let settings = Settings::default();
            if let Err(e) = settings.save(paths).await {
                tracing::warn!("Could not write default settings: {}", e);
            }
            Ok(settings)
        }
    }

    /// Save settings to disk
    pub async fn save(&self, paths: &Paths) -> Result<()> {
        let settings_path = paths.settings_file();

        if let Some(parent) = settings_path.parent() {
            fs::create_dir_all(parent)
                .await
                .io_context("Failed to create config directory", parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::InstallerError::Parse(format!("TOML: {}", e)))?;
        fs::write(&settings_path, content)
            .await
            .io_context("Failed to write settings file", &settings_path)?;

        Ok(())
    }

    pub fn progress_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.progress_interval_ms)
    }
}

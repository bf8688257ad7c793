//! Application wiring

use crate::config::{Paths, Settings};
use crate::error::InstallerError;
use crate::ops::{GitHubReleases, Installer, Platform};
use crate::store::{FileKeyValueStore, InstallationStore};
use crate::wizard::{Notice, NoticeLevel, Tasks, WizardEngine};

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Main application struct that owns the wizard
pub struct App {
    /// Installer directories
    pub paths: Paths,

    /// Loaded settings
    pub settings: Settings,

    /// Page flow
    pub engine: WizardEngine,
}

impl App {
    /// Load settings and install data, then open the first page.
    ///
    /// With `update` set the wizard skips straight to updating the loader
    /// of that game.
    pub async fn new(paths: Paths, update: Option<PathBuf>) -> Result<Self> {
        paths
            .ensure_dirs()
            .context("Failed to create installer directories")?;

        let settings = match Settings::load(&paths).await {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Failed to load settings, using defaults: {}", e);
                Settings::default()
            }
        };

        let mirror = FileKeyValueStore::new(paths.discovery_file());
        let mut store = InstallationStore::new(paths.clone(), Box::new(mirror));
        let load_error = store.load().err();
        if let Some(e) = &load_error {
            tracing::warn!("Failed to load install data: {}", e);
        }

        let platform =
            Platform::current().with_identifier_override(settings.asset_identifier.clone());
        tracing::info!("Running on {}", platform.name());

        let releases = GitHubReleases::new(settings.github.clone())
            .context("Failed to initialize release client")?;
        let installer = Installer::new(
            paths.clone(),
            platform,
            Arc::new(releases),
            settings.clone(),
        );

        let tasks = Tasks::new(Handle::current(), settings.progress_interval());
        let mut engine = WizardEngine::new(store, installer, tasks);

        if let Some(e) = load_error {
            engine.push_notice(load_notice(&e));
        }

        match update {
            Some(target) => engine.begin_update(target),
            None => engine.start(),
        }

        Ok(Self {
            paths,
            settings,
            engine,
        })
    }
}

fn load_notice(error: &InstallerError) -> Notice {
    Notice {
        level: NoticeLevel::Warning,
        title: "Unable to load installer data".to_string(),
        message: format!(
            "{}. Existing installations will not be listed until Geode is installed again.",
            error
        ),
    }
}

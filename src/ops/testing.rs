//! Local release source for tests

use super::release::DownloadProgress;
use super::{HostOs, Installer, Platform, Release, ReleaseAsset, ReleaseSource, Repository};
use crate::config::{Paths, Settings};
use crate::error::{InstallerError, Result};
use crate::ops::archive::tests::{write_executable_zip, write_zip};
use crate::store::Branch;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Stand-in for the Geode CLI. Creates the suite directory on
/// `sdk install` and records the branch on `sdk update`.
pub(crate) const FAKE_CLI: &str = r#"#!/bin/sh
case "$1" in
  --version) echo "geode 3.0.0" ;;
  sdk)
    case "$2" in
      install) mkdir -p "$3" && echo "Cloning SDK into $3" ;;
      update) echo "$3" > "$GEODE_SUITE/branch" ;;
    esac ;;
esac
"#;

/// Serves fixed releases from files on disk
pub(crate) struct FakeReleases {
    releases: HashMap<(Repository, Branch), Release>,
    /// Download URL to fixture file
    files: HashMap<String, PathBuf>,
    failing: HashSet<Repository>,
}

impl FakeReleases {
    /// Stable loader v2.0.0, API v2.0.0 and CLI v3.0.0 for the "win"
    /// identifier, plus loader and API on the nightly tag
    pub(crate) fn standard(root: &Path) -> Self {
        let fixtures = root.join("fixtures");
        let nightly = fixtures.join("nightly");
        std::fs::create_dir_all(&nightly).unwrap();

        let loader = fixtures.join("geode-v2.0.0-win.zip");
        write_zip(
            &loader,
            &[
                ("Geode.dll", "loader"),
                ("XInput9_1_0.dll", "proxy"),
                ("geode/", ""),
                ("geode/resources/", ""),
            ],
        );
        let nightly_loader = nightly.join("geode-nightly-win.zip");
        write_zip(
            &nightly_loader,
            &[
                ("Geode.dll", "nightly loader"),
                ("XInput9_1_0.dll", "proxy"),
                ("geode/", ""),
            ],
        );

        let api = fixtures.join("geode.api.geode");
        std::fs::write(&api, b"api").unwrap();
        let nightly_api = nightly.join("geode.api.geode");
        std::fs::write(&nightly_api, b"nightly api").unwrap();

        let cli = fixtures.join("geode-cli-v3.0.0-win.zip");
        let cli_name = format!("geode{}", std::env::consts::EXE_SUFFIX);
        write_executable_zip(&cli, &cli_name, FAKE_CLI);

        let mut fake = Self {
            releases: HashMap::new(),
            files: HashMap::new(),
            failing: HashSet::new(),
        };
        fake.add(Repository::Loader, Branch::Stable, "v2.0.0", &loader);
        fake.add(Repository::Loader, Branch::Nightly, "nightly", &nightly_loader);
        fake.add(Repository::Api, Branch::Stable, "v2.0.0", &api);
        fake.add(Repository::Api, Branch::Nightly, "nightly", &nightly_api);
        fake.add(Repository::Cli, Branch::Stable, "v3.0.0", &cli);
        fake
    }

    fn add(&mut self, repo: Repository, branch: Branch, tag: &str, file: &Path) {
        let name = file.file_name().unwrap().to_string_lossy().into_owned();
        let url = format!("file://{}", file.display());
        self.files.insert(url.clone(), file.to_path_buf());
        self.releases.insert(
            (repo, branch),
            Release {
                tag_name: tag.to_string(),
                assets: vec![ReleaseAsset {
                    browser_download_url: url,
                    name,
                    size: 0,
                }],
            },
        );
    }

    pub(crate) fn without_asset(mut self, repo: Repository) -> Self {
        for ((r, _), release) in self.releases.iter_mut() {
            if *r == repo {
                release.assets.clear();
            }
        }
        self
    }

    pub(crate) fn failing(mut self, repo: Repository) -> Self {
        self.failing.insert(repo);
        self
    }

    fn file_for(&self, repo: Repository) -> PathBuf {
        let url = &self.releases[&(repo, Branch::Stable)].assets[0].browser_download_url;
        self.files[url].clone()
    }

    pub(crate) fn loader_archive(&self) -> PathBuf {
        self.file_for(Repository::Loader)
    }

    pub(crate) fn cli_archive(&self) -> PathBuf {
        self.file_for(Repository::Cli)
    }
}

#[async_trait]
impl ReleaseSource for FakeReleases {
    async fn latest_release(&self, repo: Repository, branch: Branch) -> Result<Release> {
        if self.failing.contains(&repo) {
            return Err(InstallerError::Network(
                "Web request returned 500 Internal Server Error".to_string(),
            ));
        }
        self.releases
            .get(&(repo, branch))
            .cloned()
            .ok_or_else(|| InstallerError::Network("Web request returned 404 Not Found".to_string()))
    }

    async fn download_asset(
        &self,
        asset: &ReleaseAsset,
        dest: &Path,
        progress: DownloadProgress,
    ) -> Result<()> {
        let source = self
            .files
            .get(&asset.browser_download_url)
            .ok_or_else(|| InstallerError::NotFound(asset.name.clone()))?;
        let len = std::fs::metadata(source).map(|m| m.len()).unwrap_or(0);
        progress(0, Some(len));
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(source, dest)?;
        progress(len, Some(len));
        Ok(())
    }
}

/// Installer rooted at `root` that behaves like it runs on Windows
pub(crate) fn windows_installer(root: &Path, releases: FakeReleases) -> Installer {
    Installer::new(
        Paths::rooted(root),
        Platform::new(HostOs::Windows, Some("win".to_string())),
        Arc::new(releases),
        Settings::default(),
    )
}

/// Executable script at `path`
#[cfg(unix)]
pub(crate) fn write_script(path: &Path, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::write(path, body).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

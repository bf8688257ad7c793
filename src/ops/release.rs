//! Release metadata and asset downloads from GitHub

use crate::config::GitHubSettings;
use crate::error::{InstallerError, IoContext, Result};
use crate::store::Branch;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Download progress callback
/// Parameters: (received_bytes, expected_bytes when known)
pub type DownloadProgress = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Repositories the installer pulls releases from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Repository {
    Loader,
    Api,
    Cli,
}

impl Repository {
    pub fn display_name(&self) -> &'static str {
        match self {
            Repository::Loader => "Geode loader",
            Repository::Api => "Geode API",
            Repository::Cli => "Geode CLI",
        }
    }
}

/// A downloadable file attached to a release
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: u64,
}

/// Release metadata
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

impl Release {
    /// First asset whose name contains `needle`
    pub fn find_asset(&self, needle: &str) -> Option<&ReleaseAsset> {
        self.assets.iter().find(|a| a.name.contains(needle))
    }
}

/// Source of releases and their assets
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Latest release of `repo` on `branch`
    async fn latest_release(&self, repo: Repository, branch: Branch) -> Result<Release>;

    /// Stream `asset` into `dest`
    async fn download_asset(
        &self,
        asset: &ReleaseAsset,
        dest: &Path,
        progress: DownloadProgress,
    ) -> Result<()>;
}

/// GitHub REST client
#[derive(Clone)]
pub struct GitHubReleases {
    client: reqwest::Client,
    settings: GitHubSettings,
}

impl GitHubReleases {
    pub fn new(settings: GitHubSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(settings.user_agent.clone())
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| InstallerError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, settings })
    }

    fn repo_name(&self, repo: Repository) -> &str {
        match repo {
            Repository::Loader => &self.settings.loader_repo,
            Repository::Api => &self.settings.api_repo,
            Repository::Cli => &self.settings.cli_repo,
        }
    }

    /// Endpoint for the newest release on a branch
    pub fn release_url(&self, repo: Repository, branch: Branch) -> String {
        let base = self.settings.api_base.trim_end_matches('/');
        let suffix = match branch {
            Branch::Stable => "releases/latest",
            Branch::Nightly => "releases/tags/nightly",
        };
        format!(
            "{}/repos/{}/{}/{}",
            base,
            self.settings.owner,
            self.repo_name(repo),
            suffix
        )
    }
}

fn check_status(status: reqwest::StatusCode) -> Result<()> {
    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(InstallerError::Network(
            "Unauthorized to do web request".to_string(),
        ));
    }
    if !status.is_success() {
        return Err(InstallerError::Network(format!(
            "Web request returned {}",
            status
        )));
    }
    Ok(())
}

#[async_trait]
impl ReleaseSource for GitHubReleases {
    async fn latest_release(&self, repo: Repository, branch: Branch) -> Result<Release> {
        let url = self.release_url(repo, branch);
        tracing::debug!("Fetching release metadata from {}", url);

        let response = self.client.get(&url).send().await?;
        check_status(response.status())?;

        let body = response.text().await?;
        let release: Release = serde_json::from_str(&body)
            .map_err(|e| InstallerError::Parse(format!("release metadata: {}", e)))?;

        tracing::info!(
            repo = repo.display_name(),
            tag = %release.tag_name,
            "Found release"
        );
        Ok(release)
    }

    async fn download_asset(
        &self,
        asset: &ReleaseAsset,
        dest: &Path,
        progress: DownloadProgress,
    ) -> Result<()> {
        use futures::StreamExt;
        use tokio::io::AsyncWriteExt;

        let response = self.client.get(&asset.browser_download_url).send().await?;
        check_status(response.status())?;

        let total_size = response.content_length().filter(|len| *len > 0);

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .io_context("Failed to create download directory", parent)?;
        }
        let mut file = tokio::fs::File::create(dest)
            .await
            .io_context("Failed to create download file", dest)?;

        progress(0, total_size);

        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .io_context("Error writing to file", dest)?;
            downloaded += chunk.len() as u64;
            progress(downloaded, total_size);
        }

        file.flush().await.io_context("Error writing to file", dest)?;
        tracing::info!("Downloaded {} ({} bytes)", asset.name, downloaded);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release() -> Release {
        serde_json::from_str(
            r#"{
                "tag_name": "v2.0.0",
                "assets": [
                    {"name": "geode-v2.0.0-win.zip", "browser_download_url": "https://x/win.zip", "size": 10},
                    {"name": "geode-v2.0.0-mac.zip", "browser_download_url": "https://x/mac.zip"},
                    {"name": "geode.api.geode", "browser_download_url": "https://x/api.geode", "size": 3}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_find_asset_by_substring() {
        let release = release();
        assert_eq!(
            release.find_asset("win").map(|a| a.browser_download_url.as_str()),
            Some("https://x/win.zip")
        );
        assert_eq!(release.find_asset(".geode").map(|a| a.size), Some(3));
        assert_eq!(release.find_asset("mac").map(|a| a.size), Some(0));
        assert!(release.find_asset("linux").is_none());
    }

    #[test]
    fn test_release_urls() {
        let client = GitHubReleases::new(GitHubSettings::default()).unwrap();
        assert_eq!(
            client.release_url(Repository::Loader, Branch::Stable),
            "https://api.github.com/repos/geode-sdk/loader/releases/latest"
        );
        assert_eq!(
            client.release_url(Repository::Cli, Branch::Nightly),
            "https://api.github.com/repos/geode-sdk/cli/releases/tags/nightly"
        );
    }

    #[test]
    fn test_status_mapping() {
        assert!(check_status(reqwest::StatusCode::OK).is_ok());
        let err = check_status(reqwest::StatusCode::UNAUTHORIZED).unwrap_err();
        assert_eq!(err.to_string(), "Unauthorized to do web request");
        let err = check_status(reqwest::StatusCode::NOT_FOUND).unwrap_err();
        assert!(err.to_string().starts_with("Web request returned 404"));
    }
}

//! Install, update and uninstall operations
//!
//! [`Installer`] performs every side effect the wizard needs. Long-running
//! operations are `async` and report through a [`Reporter`]; they never touch
//! the installation store, which only the UI thread mutates.

pub mod archive;
pub mod platform;
pub mod release;
pub mod task;
pub mod version;

#[cfg(test)]
pub(crate) mod testing;

pub use archive::{unpack_archive_to, UnpackProgress};
pub use platform::{ConflictFlags, GameLayout, GamePathCheck, HostOs, Platform};
pub use release::{GitHubReleases, Release, ReleaseAsset, ReleaseSource, Repository};
pub use task::{
    OperationState, Reporter, TaskEvent, TaskId, TaskMessage, TaskOutput, UninstallReport,
    UpdateCheck,
};

use crate::config::{Paths, Settings, SUITE_ENV_VAR};
use crate::error::{InstallerError, IoContext, Result};
use crate::store::{Branch, Installation, InstallationStore};
use release::DownloadProgress;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

/// A release asset saved locally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedAsset {
    pub path: PathBuf,
    pub file_name: String,
    /// Tag of the release the asset came from
    pub version: String,
}

/// What the developer tools install should do
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevToolsRequest {
    pub sdk_dir: PathBuf,
    pub branch: Branch,
    pub add_to_path: bool,
}

/// What an uninstall should remove
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallPlan {
    pub installations: Vec<Installation>,
    pub delete_save_data: bool,
    /// SDK suite to remove, if any
    pub suite_dir: Option<PathBuf>,
    pub remove_cli: bool,
}

impl UninstallPlan {
    /// Number of progress events the uninstall sends
    pub fn steps(&self) -> usize {
        let per_installation = if self.delete_save_data { 2 } else { 1 };
        self.installations.len() * per_installation
            + usize::from(self.suite_dir.is_some())
            + usize::from(self.remove_cli)
    }
}

/// Performs installer side effects
#[derive(Clone)]
pub struct Installer {
    paths: Paths,
    platform: Platform,
    releases: Arc<dyn ReleaseSource>,
    settings: Settings,
}

impl Installer {
    pub fn new(
        paths: Paths,
        platform: Platform,
        releases: Arc<dyn ReleaseSource>,
        settings: Settings,
    ) -> Self {
        Self {
            paths,
            platform,
            releases,
            settings,
        }
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    // ========== Downloads ==========

    /// Fetch the newest release of `repo` and download the matching asset
    pub async fn download(
        &self,
        repo: Repository,
        branch: Branch,
        reporter: &Reporter,
    ) -> Result<DownloadedAsset> {
        reporter.connecting(format!("{}: Connecting...", repo.display_name()));

        let release = self.releases.latest_release(repo, branch).await?;
        let needle = match repo {
            Repository::Api => ".geode",
            Repository::Loader | Repository::Cli => self.platform.asset_identifier()?,
        };
        let asset = release.find_asset(needle).cloned().ok_or_else(|| {
            InstallerError::NotFound(format!(
                "No release asset for {} found",
                self.platform.name()
            ))
        })?;

        let dest = self.paths.downloads_dir().join(&asset.name);
        let label = repo.display_name();
        let progress_reporter = reporter.clone();
        let progress: DownloadProgress = Arc::new(move |received, total| {
            progress_reporter.downloading(label, received, total)
        });

        tracing::info!(
            "Downloading {} {} to {}",
            asset.name,
            release.tag_name,
            dest.display()
        );
        self.releases.download_asset(&asset, &dest, progress).await?;

        Ok(DownloadedAsset {
            path: dest,
            file_name: asset.name,
            version: release.tag_name,
        })
    }

    pub async fn download_loader(&self, branch: Branch, reporter: &Reporter) -> Result<DownloadedAsset> {
        self.download(Repository::Loader, branch, reporter).await
    }

    pub async fn download_api(&self, branch: Branch, reporter: &Reporter) -> Result<DownloadedAsset> {
        self.download(Repository::Api, branch, reporter).await
    }

    pub async fn download_cli(&self, reporter: &Reporter) -> Result<DownloadedAsset> {
        self.download(Repository::Cli, Branch::Stable, reporter).await
    }

    // ========== Loader ==========

    /// Unpack a loader archive next to `game_exe` without recording it
    pub fn unpack_loader_for(
        &self,
        game_exe: &Path,
        archive: &Path,
        version: &str,
        branch: Branch,
        progress: Option<UnpackProgress>,
    ) -> Result<Installation> {
        let install_dir = self.platform.install_dir_for(game_exe)?;
        let loader_dir = self.platform.loader_dir_for(&install_dir);

        unpack_archive_to(archive, &loader_dir, progress)?;

        if self.platform.layout() == GameLayout::WindowsLike {
            let appid = install_dir.join("steam_appid.txt");
            std::fs::write(&appid, platform::GD_APP_ID)
                .io_context("Failed to write steam_appid.txt", &appid)?;
        }

        let executable = game_exe
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        tracing::info!("Unpacked Geode {} into {}", version, install_dir.display());
        Ok(Installation::new(install_dir, executable, version, branch))
    }

    /// Unpack a loader archive and record the installation
    pub fn install_loader_for(
        &self,
        store: &mut InstallationStore,
        game_exe: &Path,
        archive: &Path,
        version: &str,
        branch: Branch,
    ) -> Result<Installation> {
        let installation = self.unpack_loader_for(game_exe, archive, version, branch, None)?;
        store.add_or_update(installation.clone());
        Ok(installation)
    }

    /// Copy the API mod into `<install_dir>/geode/mods/`
    pub fn install_api_for(&self, install_dir: &Path, api_file: &Path, file_name: &str) -> Result<PathBuf> {
        let mods_dir = install_dir.join("geode").join("mods");
        std::fs::create_dir_all(&mods_dir).io_context("Failed to create mods directory", &mods_dir)?;

        let dest = mods_dir.join(file_name);
        std::fs::copy(api_file, &dest).io_context("Failed to copy API mod", &dest)?;
        Ok(dest)
    }

    /// Download and unpack loader and API for `game_exe`.
    ///
    /// Stops at the first failing stage. Files from finished stages stay on
    /// disk; running the install again overwrites them.
    pub async fn install_geode_for(
        &self,
        game_exe: &Path,
        branch: Branch,
        reporter: &Reporter,
    ) -> Result<Installation> {
        let loader = self.download_loader(branch, &reporter.scoped(0, 50)).await?;
        reporter.installing("Installing Geode...");
        let installation = {
            let installer = self.clone();
            let game_exe = game_exe.to_path_buf();
            let progress = unpack_progress(reporter, "Geode");
            blocking(move || {
                installer.unpack_loader_for(
                    &game_exe,
                    &loader.path,
                    &loader.version,
                    branch,
                    Some(progress),
                )
            })
            .await?
        };

        let api = self.download_api(branch, &reporter.scoped(50, 100)).await?;
        reporter.installing("Installing Geode API...");
        let installer = self.clone();
        let install_dir = installation.path.clone();
        blocking(move || installer.install_api_for(&install_dir, &api.path, &api.file_name)).await?;

        Ok(installation)
    }

    /// Re-install the newest loader and API into an existing installation
    pub async fn update_installation(
        &self,
        installation: &Installation,
        reporter: &Reporter,
    ) -> Result<Installation> {
        let game_exe = self.platform.game_executable(installation);
        self.install_geode_for(&game_exe, installation.branch, reporter)
            .await
    }

    /// Remove the loader's own files from an installation directory
    pub fn uninstall_from(&self, installation: &Installation) -> Result<()> {
        for relative in self.platform.loader_files() {
            let target = installation.path.join(relative);
            let result = if target.is_dir() {
                std::fs::remove_dir_all(&target)
            } else {
                std::fs::remove_file(&target)
            };
            match result {
                Ok(()) => tracing::debug!("Removed {}", target.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(InstallerError::io("Failed to remove", &target, e)),
            }
        }
        tracing::info!("Uninstalled Geode from {}", installation.path.display());
        Ok(())
    }

    /// Remove the selected parts in order. Failing steps are collected in
    /// the report and the remaining steps still run.
    pub async fn uninstall(&self, plan: UninstallPlan, reporter: &Reporter) -> Result<TaskOutput> {
        let installer = self.clone();
        let reporter = reporter.clone();
        blocking(move || {
            Ok(TaskOutput::Uninstalled(
                installer.uninstall_blocking(&plan, &reporter),
            ))
        })
        .await
    }

    fn uninstall_blocking(&self, plan: &UninstallPlan, reporter: &Reporter) -> UninstallReport {
        let mut report = UninstallReport::default();

        for installation in &plan.installations {
            reporter.installing(format!(
                "Uninstalling Geode from {}...",
                installation.path.display()
            ));
            match self.uninstall_from(installation) {
                Ok(()) => report.removed.push(installation.path.clone()),
                Err(e) => report.errors.push(format!(
                    "Unable to uninstall Geode from {}: {}. You may have to remove the remaining files manually.",
                    installation.path.display(),
                    e
                )),
            }
        }

        if plan.delete_save_data {
            for installation in &plan.installations {
                reporter.installing(format!(
                    "Deleting save data of {}...",
                    installation.path.display()
                ));
                let result = self.delete_save_data_from(installation);
                if let Err(message) = save_data_outcome(installation, result) {
                    report.errors.push(message);
                }
            }
        }

        if let Some(suite_dir) = &plan.suite_dir {
            reporter.installing("Uninstalling the Geode SDK...");
            match self.uninstall_suite(suite_dir) {
                Ok(()) => report.suite_removed = true,
                Err(e) => report
                    .errors
                    .push(format!("Unable to uninstall the Geode SDK: {}", e)),
            }
        }

        if plan.remove_cli {
            reporter.installing("Uninstalling the Geode CLI...");
            if let Err(e) = self.uninstall_cli() {
                report
                    .errors
                    .push(format!("Unable to uninstall the Geode CLI: {}", e));
            }
        }

        report
    }

    /// Remove Geode's save data for an installation
    pub fn delete_save_data_from(&self, installation: &Installation) -> Result<PathBuf> {
        let dir = self.platform.save_data_dir(&self.paths, installation);
        if !dir.is_dir() {
            return Err(InstallerError::NotFound(
                "Save data directory not found!".to_string(),
            ));
        }
        std::fs::remove_dir_all(&dir).io_context("Failed to delete save data", &dir)?;
        tracing::info!("Deleted save data at {}", dir.display());
        Ok(dir)
    }

    // ========== Developer tools ==========

    /// Where the CLI lives after `install_cli`
    pub fn cli_binary(&self) -> PathBuf {
        self.paths
            .bin_dir()
            .join(format!("geode{}", std::env::consts::EXE_SUFFIX))
    }

    fn locate_cli(&self) -> Result<PathBuf> {
        let bundled = self.cli_binary();
        if bundled.is_file() {
            return Ok(bundled);
        }
        which::which("geode")
            .map_err(|_| InstallerError::NotFound("Geode CLI not found".to_string()))
    }

    /// Unpack the CLI archive into the bin directory
    pub fn install_cli(&self, archive: &Path, progress: Option<UnpackProgress>) -> Result<PathBuf> {
        let bin_dir = self.paths.bin_dir();
        unpack_archive_to(archive, &bin_dir, progress)?;

        let binary = self.cli_binary();
        if !binary.is_file() {
            return Err(InstallerError::NotFound(format!(
                "{} does not contain the Geode CLI",
                archive.display()
            )));
        }
        tracing::info!("Installed Geode CLI to {}", binary.display());
        Ok(binary)
    }

    async fn install_cli_blocking(&self, archive: PathBuf, reporter: &Reporter) -> Result<PathBuf> {
        let installer = self.clone();
        let progress = unpack_progress(reporter, "Geode CLI");
        blocking(move || installer.install_cli(&archive, Some(progress))).await
    }

    pub fn uninstall_cli(&self) -> Result<()> {
        let bin_dir = self.paths.bin_dir();
        match std::fs::remove_dir_all(&bin_dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(InstallerError::io("Failed to remove CLI", &bin_dir, e)),
        }
    }

    pub fn add_cli_to_path(&self) -> Result<()> {
        platform::env::add_to_user_path(&self.paths.bin_dir())
    }

    pub fn add_suite_env(&self, suite_dir: &Path) -> Result<()> {
        platform::env::set_user_var(SUITE_ENV_VAR, &suite_dir.to_string_lossy())
    }

    /// Run the CLI, forwarding its output as coalesced progress. Stderr is
    /// collected alongside so a chatty CLI can't fill the pipe and stall.
    async fn run_cli(
        &self,
        cli: &Path,
        args: &[OsString],
        suite_dir: &Path,
        reporter: &Reporter,
    ) -> Result<()> {
        use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

        tracing::info!("Running {} {:?}", cli.display(), args);
        let mut child = tokio::process::Command::new(cli)
            .args(args)
            .env(SUITE_ENV_VAR, suite_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .io_context("Failed to run the Geode CLI", cli)?;

        let stderr_reader = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf).await;
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines
                .next_line()
                .await
                .io_context("Failed to read CLI output", cli)?
            {
                let line = line.trim();
                if !line.is_empty() {
                    tracing::debug!("geode: {}", line);
                    reporter.installing_output(format!("Installing SDK: {}", line));
                }
            }
        }

        let status = child
            .wait()
            .await
            .io_context("Failed to wait for the Geode CLI", cli)?;
        let stderr = match stderr_reader {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };
        if !status.success() {
            return Err(InstallerError::io(
                format!("Geode CLI exited with {}", status),
                cli,
                std::io::Error::other(stderr.trim().to_string()),
            ));
        }
        if !stderr.trim().is_empty() {
            tracing::debug!("geode stderr: {}", stderr.trim());
        }
        Ok(())
    }

    /// Install the SDK suite into `suite_dir` with the CLI
    pub async fn install_suite(
        &self,
        cli: &Path,
        suite_dir: &Path,
        branch: Branch,
        reporter: &Reporter,
    ) -> Result<()> {
        if let Some(parent) = suite_dir.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .io_context("Failed to create directory", parent)?;
        }

        reporter.installing("Installing SDK...");
        let install_args: Vec<OsString> =
            vec!["sdk".into(), "install".into(), suite_dir.as_os_str().to_owned()];
        self.run_cli(cli, &install_args, suite_dir, reporter).await?;

        if branch.is_nightly() {
            reporter.installing("Switching SDK to nightly...");
            let update_args: Vec<OsString> = vec!["sdk".into(), "update".into(), "nightly".into()];
            self.run_cli(cli, &update_args, suite_dir, reporter).await?;
        }

        tracing::info!("Installed SDK suite into {}", suite_dir.display());
        Ok(())
    }

    /// Download the CLI, install it and set up the SDK suite
    pub async fn install_dev_tools(
        &self,
        request: &DevToolsRequest,
        reporter: &Reporter,
    ) -> Result<TaskOutput> {
        let cli_asset = self.download_cli(&reporter.scoped(0, 40)).await?;
        reporter.installing("Installing Geode CLI...");
        let cli = self.install_cli_blocking(cli_asset.path, reporter).await?;

        self.install_suite(&cli, &request.sdk_dir, request.branch, &reporter.scoped(40, 100))
            .await?;

        let mut warnings = Vec::new();
        if let Err(e) = self.add_suite_env(&request.sdk_dir) {
            tracing::warn!("Could not set {}: {}", SUITE_ENV_VAR, e);
            warnings.push(format!("Error setting {}: {}", SUITE_ENV_VAR, e));
        }
        if request.add_to_path {
            if let Err(e) = self.add_cli_to_path() {
                tracing::warn!("Could not add CLI to PATH: {}", e);
                warnings.push(format!("Error adding Geode CLI to Path: {}", e));
            }
        }

        Ok(TaskOutput::DevToolsInstalled {
            suite_dir: request.sdk_dir.clone(),
            path_warning: (!warnings.is_empty()).then(|| warnings.join("\n")),
        })
    }

    /// Download and install the newest CLI over the current one
    pub async fn update_cli(&self, reporter: &Reporter) -> Result<TaskOutput> {
        let cli_asset = self.download_cli(reporter).await?;
        reporter.installing("Installing Geode CLI...");
        self.install_cli_blocking(cli_asset.path.clone(), reporter)
            .await?;
        Ok(TaskOutput::CliInstalled {
            version: cli_asset.version,
        })
    }

    /// Remove the SDK suite and its environment entries
    pub fn uninstall_suite(&self, suite_dir: &Path) -> Result<()> {
        match std::fs::remove_dir_all(suite_dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(InstallerError::io("Failed to remove SDK", suite_dir, e)),
        }
        platform::env::remove_from_user_path(&self.paths.bin_dir())?;
        platform::env::remove_user_var(SUITE_ENV_VAR)?;
        tracing::info!("Uninstalled SDK suite from {}", suite_dir.display());
        Ok(())
    }

    // ========== Updates ==========

    pub async fn check_loader_update(
        &self,
        installation: &Installation,
        reporter: &Reporter,
    ) -> Result<UpdateCheck> {
        reporter.connecting("Checking for updates...");
        let release = self
            .releases
            .latest_release(Repository::Loader, installation.branch)
            .await?;
        Ok(UpdateCheck {
            current: installation.version.clone(),
            available: release.tag_name,
            nightly: installation.branch.is_nightly(),
        })
    }

    pub async fn check_cli_update(&self, reporter: &Reporter) -> Result<UpdateCheck> {
        reporter.connecting("Checking for updates...");
        let cli = self.locate_cli()?;
        let output = tokio::process::Command::new(&cli)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .io_context("Failed to run the Geode CLI", &cli)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let current = parse_cli_version(&stdout).ok_or_else(|| {
            InstallerError::Parse(format!("CLI version from '{}'", stdout.trim()))
        })?;

        let release = self
            .releases
            .latest_release(Repository::Cli, Branch::Stable)
            .await?;
        Ok(UpdateCheck {
            current,
            available: release.tag_name,
            nightly: false,
        })
    }

    // ========== Discovery ==========

    /// Best-effort search of the Steam libraries for the game
    pub fn find_default_game_path(&self) -> Option<PathBuf> {
        let roots = self.platform.steam_roots(&self.paths);
        let found = self.platform.find_game_in_steam(&roots);
        match &found {
            Some(path) => tracing::info!("Detected Geometry Dash at {}", path.display()),
            None => tracing::info!("Geometry Dash not found in Steam libraries"),
        }
        found
    }

    pub fn detect_conflicting_mods(&self, dir: &Path) -> ConflictFlags {
        self.platform.detect_conflicting_mods(dir)
    }

    pub fn needs_elevation(&self, dir: &Path) -> bool {
        platform::needs_elevation(dir)
    }

    /// Start the game without waiting for it
    pub fn launch(&self, installation: &Installation) -> Result<()> {
        let target = self.platform.game_executable(installation);
        tracing::info!("Launching {}", target.display());

        match self.platform.os {
            HostOs::MacOs => open::that(&target).io_context("Failed to launch", &target),
            HostOs::Windows => spawn_in_own_dir(&target, &target, &[]),
            HostOs::Linux => {
                let in_steam = installation
                    .path
                    .components()
                    .any(|c| c.as_os_str() == "steamapps");
                if in_steam {
                    let url = format!("steam://rungameid/{}", platform::GD_APP_ID);
                    return open::that(&url).io_context("Failed to launch", &target);
                }
                let wine = which::which("wine").map_err(|_| {
                    InstallerError::PlatformUnsupported(
                        "launching outside Steam needs wine".to_string(),
                    )
                })?;
                spawn_in_own_dir(&wine, &target, &[target.as_os_str().to_owned()])
            }
        }
    }
}

/// Run filesystem-heavy work on the blocking pool. A panic inside `work`
/// resumes in the caller.
async fn blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(InstallerError::io(
            "Background work was cancelled",
            PathBuf::new(),
            std::io::Error::other(e),
        )),
    }
}

fn unpack_progress(reporter: &Reporter, label: &'static str) -> UnpackProgress {
    let reporter = reporter.clone();
    Arc::new(move |entry: &str, done, total| reporter.unpacking(label, entry, done, total))
}

/// Missing save data is fine; any other failure becomes a message for the
/// user
fn save_data_outcome(
    installation: &Installation,
    result: Result<PathBuf>,
) -> std::result::Result<(), String> {
    match result {
        Ok(dir) => {
            tracing::info!("Removed save data {}", dir.display());
            Ok(())
        }
        Err(InstallerError::NotFound(_)) => {
            tracing::info!("No save data for {}", installation.path.display());
            Ok(())
        }
        Err(e) => Err(format!(
            "Unable to delete save data of {}: {}",
            installation.path.display(),
            e
        )),
    }
}

fn spawn_in_own_dir(program: &Path, game: &Path, args: &[OsString]) -> Result<()> {
    let mut cmd = std::process::Command::new(program);
    cmd.args(args);
    if let Some(dir) = game.parent() {
        cmd.current_dir(dir);
    }
    cmd.spawn().io_context("Failed to launch", game)?;
    Ok(())
}

/// `geode 2.5.0` -> `2.5.0`
fn parse_cli_version(output: &str) -> Option<String> {
    output
        .lines()
        .next()?
        .split_whitespace()
        .last()
        .filter(|v| v.chars().any(|c| c.is_ascii_digit()))
        .map(str::to_string)
}

use anyhow::{Context, Result};
use clap::Parser;
use geode_installer::config::Paths;
use geode_installer::tui::Tui;
use geode_installer::{App, APP_VERSION};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long running downloads may keep the process alive after the window closes
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Parser)]
#[command(name = "geode-installer")]
#[command(
    author,
    version,
    about = "Installer for the Geode mod loader for Geometry Dash"
)]
struct Cli {
    /// Update the Geode loader of this game executable or installation directory
    #[arg(long, value_name = "PATH")]
    update: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn setup_logging(log_dir: &Path, verbosity: u8) {
    let filter = match verbosity {
        0 => "geode_installer=info",
        1 => "geode_installer=debug",
        _ => "geode_installer=trace",
    };
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    // Write logs to a file to avoid corrupting the TUI
    let file = std::fs::create_dir_all(log_dir).and_then(|_| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_dir.join("installer.log"))
    });

    match file {
        Ok(file) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(std::sync::Arc::new(file)),
                )
                .init();
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .init();
            tracing::warn!("Could not open log file in {}: {}", log_dir.display(), e);
        }
    }
}

async fn run(cli: Cli, paths: Paths) -> Result<()> {
    let mut app = App::new(paths, cli.update).await?;
    let mut tui = Tui::new()?;
    tui.run(&mut app).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let paths = Paths::new().context("Failed to locate installer directories")?;
    setup_logging(&paths.log_dir(), cli.verbose);
    tracing::info!("Geode Installer v{} starting", APP_VERSION);

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(run(cli, paths));

    // Operations still running are abandoned
    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);

    match &result {
        Ok(()) => tracing::info!("Installer closed"),
        Err(e) => tracing::error!("Installer failed: {:#}", e),
    }
    result
}

//! Geode Installer - a TUI installer for the Geode mod loader
//!
//! This crate provides:
//! - Installation of the loader and API mod into Geometry Dash and GDPS copies
//! - Developer tools setup (Geode CLI and SDK suite)
//! - Updating and uninstalling recorded installations
//! - A page-flow wizard driving all of the above

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod app;
pub mod config;
pub mod error;
pub mod ops;
pub mod store;
pub mod tui;
pub mod wizard;

pub use app::App;
pub use config::Settings;
pub use error::{InstallerError, Result};

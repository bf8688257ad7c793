//! Data committed by earlier pages for later ones

use super::structure::InstallType;
use crate::store::{Branch, Installation};
use std::path::PathBuf;

/// What the Manage pages operate on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManageTarget {
    Cli,
    /// Installation directory, or a game executable in update mode
    Installation(PathBuf),
}

/// Typed cross-page state. Pages write their fields in `leave` and read
/// fields of earlier pages in `enter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WizardContext {
    pub install_type: InstallType,

    // ========== Install ==========
    /// Game executable picked on the select page
    pub game_path: Option<PathBuf>,
    pub branch: Branch,
    /// Set once the install operation has recorded its result
    pub installed: Option<Installation>,

    // ========== Developer tools ==========
    pub sdk_dir: Option<PathBuf>,
    pub sdk_branch: Branch,
    pub add_cli_to_path: bool,

    // ========== Uninstall ==========
    pub complete_uninstall: bool,
    pub uninstall_targets: Vec<PathBuf>,
    pub uninstall_suite: bool,
    pub delete_save_data: bool,

    // ========== Manage ==========
    pub manage_target: Option<ManageTarget>,
    pub update_mode: bool,
}

impl Default for WizardContext {
    fn default() -> Self {
        Self {
            install_type: InstallType::Install,
            game_path: None,
            branch: Branch::Stable,
            installed: None,
            sdk_dir: None,
            sdk_branch: Branch::Nightly,
            add_cli_to_path: true,
            complete_uninstall: true,
            uninstall_targets: Vec::new(),
            uninstall_suite: false,
            delete_save_data: true,
            manage_target: None,
            update_mode: false,
        }
    }
}

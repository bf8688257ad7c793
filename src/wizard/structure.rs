//! Page sequences per top-level action

use super::page::PageId;

/// Top-level action picked on the start page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstallType {
    Install,
    InstallOnGdps,
    InstallDevTools,
    Uninstall,
    Manage,
    /// `--update <path>`
    Update,
}

const INSTALL: &[PageId] = &[
    PageId::Eula,
    PageId::InstallSelectGd,
    PageId::InstallOptBeta,
    PageId::InstallCheckMods,
    PageId::Install,
    PageId::InstallFinished,
];

const DEV_TOOLS: &[PageId] = &[
    PageId::DevInstallSelectSdk,
    PageId::DevInstallBranch,
    PageId::DevInstallAddToPath,
    PageId::DevInstall,
    PageId::DevInstallFinished,
];

const UNINSTALL: &[PageId] = &[
    PageId::UninstallStart,
    PageId::UninstallSelect,
    PageId::UninstallDeleteData,
    PageId::Uninstall,
    PageId::UninstallFinished,
];

const MANAGE: &[PageId] = &[
    PageId::ManageSelect,
    PageId::ManageCheck,
    PageId::ManageUpdate,
    PageId::ManageFinished,
];

const UPDATE: &[PageId] = &[PageId::ManageUpdate, PageId::ManageFinished];

impl InstallType {
    /// Ordered pages for this action
    pub fn structure(&self) -> Vec<PageId> {
        match self {
            InstallType::Install => INSTALL.to_vec(),
            InstallType::InstallOnGdps => {
                let mut pages = vec![PageId::InstallGdpsInfo];
                pages.extend_from_slice(INSTALL);
                pages
            }
            InstallType::InstallDevTools => DEV_TOOLS.to_vec(),
            InstallType::Uninstall => UNINSTALL.to_vec(),
            InstallType::Manage => MANAGE.to_vec(),
            InstallType::Update => UPDATE.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gdps_prefixes_install() {
        let gdps = InstallType::InstallOnGdps.structure();
        assert_eq!(gdps[0], PageId::InstallGdpsInfo);
        assert_eq!(&gdps[1..], InstallType::Install.structure().as_slice());
    }

    #[test]
    fn test_structures_end_on_finish_pages() {
        let ends: Vec<_> = [
            InstallType::Install,
            InstallType::InstallDevTools,
            InstallType::Uninstall,
            InstallType::Manage,
            InstallType::Update,
        ]
        .iter()
        .filter_map(|t| t.structure().last().copied())
        .collect();
        assert_eq!(
            ends,
            vec![
                PageId::InstallFinished,
                PageId::DevInstallFinished,
                PageId::UninstallFinished,
                PageId::ManageFinished,
                PageId::ManageFinished
            ]
        );
    }
}

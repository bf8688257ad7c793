//! Concrete wizard pages

mod dev;
mod general;
mod install;
mod manage;
mod uninstall;

pub use dev::{
    DevInstallFinishedPage, DevInstallPage, DevInstallAddToPathPage, DevInstallBranchPage,
    DevInstallSelectSdkPage,
};
pub use general::{FirstStartPage, NotFoundPage, StartPage};
pub use install::{
    EulaPage, InstallCheckModsPage, InstallFinishedPage, InstallGdpsInfoPage, InstallOptBetaPage,
    InstallPage, InstallSelectGdPage,
};
pub use manage::{ManageCheckPage, ManageFinishedPage, ManageSelectPage, ManageUpdatePage};
pub use uninstall::{
    UninstallDeleteDataPage, UninstallFinishedPage, UninstallPage, UninstallSelectPage,
    UninstallStartPage,
};

use super::page::{Page, PageCx, PageId, Widget};
use super::PageCtor;
use crate::ops::{OperationState, TaskId};
use std::collections::HashMap;

fn register<P: Page + Default + 'static>(registry: &mut HashMap<PageId, PageCtor>, id: PageId) {
    registry.insert(id, Box::new(|| Box::<P>::default()));
}

/// Constructors for every page
pub fn registry() -> HashMap<PageId, PageCtor> {
    let mut r = HashMap::new();

    register::<NotFoundPage>(&mut r, PageId::NotFound);
    register::<StartPage>(&mut r, PageId::Start);
    register::<FirstStartPage>(&mut r, PageId::FirstStart);

    register::<EulaPage>(&mut r, PageId::Eula);
    register::<InstallGdpsInfoPage>(&mut r, PageId::InstallGdpsInfo);
    register::<InstallSelectGdPage>(&mut r, PageId::InstallSelectGd);
    register::<InstallOptBetaPage>(&mut r, PageId::InstallOptBeta);
    register::<InstallCheckModsPage>(&mut r, PageId::InstallCheckMods);
    register::<InstallPage>(&mut r, PageId::Install);
    register::<InstallFinishedPage>(&mut r, PageId::InstallFinished);

    register::<DevInstallSelectSdkPage>(&mut r, PageId::DevInstallSelectSdk);
    register::<DevInstallBranchPage>(&mut r, PageId::DevInstallBranch);
    register::<DevInstallAddToPathPage>(&mut r, PageId::DevInstallAddToPath);
    register::<DevInstallPage>(&mut r, PageId::DevInstall);
    register::<DevInstallFinishedPage>(&mut r, PageId::DevInstallFinished);

    register::<UninstallStartPage>(&mut r, PageId::UninstallStart);
    register::<UninstallSelectPage>(&mut r, PageId::UninstallSelect);
    register::<UninstallDeleteDataPage>(&mut r, PageId::UninstallDeleteData);
    register::<UninstallPage>(&mut r, PageId::Uninstall);
    register::<UninstallFinishedPage>(&mut r, PageId::UninstallFinished);

    register::<ManageSelectPage>(&mut r, PageId::ManageSelect);
    register::<ManageCheckPage>(&mut r, PageId::ManageCheck);
    register::<ManageUpdatePage>(&mut r, PageId::ManageUpdate);
    register::<ManageFinishedPage>(&mut r, PageId::ManageFinished);

    r
}

/// Persist the store, telling the user when that fails
fn save_install_data(cx: &mut PageCx<'_>) {
    if let Err(e) = cx.store.save() {
        cx.error(
            "Unable to save installer data",
            format!(
                "Unable to save installer data: {} - the installer will be unable to uninstall Geode!",
                e
            ),
        );
    }
}

/// Display state of one background operation owned by a page
#[derive(Debug, Default)]
struct OperationView {
    task: Option<TaskId>,
    state: OperationState,
    status: String,
    percent: u16,
    error: Option<String>,
}

impl OperationView {
    fn begin(&mut self, task: TaskId) {
        *self = Self {
            task: Some(task),
            state: OperationState::Connecting,
            status: "Connecting...".to_string(),
            ..Self::default()
        };
    }

    fn owns(&self, task: TaskId) -> bool {
        self.task == Some(task)
    }

    fn progress(&mut self, state: OperationState, status: String) {
        if let OperationState::Downloading(percent) = state {
            self.percent = u16::from(percent);
        }
        self.state = state;
        self.status = status;
    }

    /// Progress of an operation that counts its own steps
    fn step(&mut self, status: String, percent: u16) {
        self.state = OperationState::Installing;
        self.status = status;
        self.percent = percent;
    }

    fn complete(&mut self) {
        self.task = None;
        self.state = OperationState::Completed;
        self.status = "Finished".to_string();
        self.percent = 100;
    }

    /// `message` is the explanation shown in the error box
    fn fail(&mut self, reason: &str, message: String) {
        self.task = None;
        self.state = OperationState::Failed(reason.to_string());
        self.status = format!("Error: {}", reason);
        self.error = Some(message);
    }

    fn is_running(&self) -> bool {
        self.task.is_some()
    }

    fn is_idle(&self) -> bool {
        self.state == OperationState::Idle
    }

    fn is_done(&self) -> bool {
        self.state == OperationState::Completed
    }

    fn has_failed(&self) -> bool {
        matches!(self.state, OperationState::Failed(_))
    }

    fn widgets(&self) -> Vec<Widget> {
        let mut widgets = vec![Widget::Progress {
            status: self.status.clone(),
            percent: self.percent,
        }];
        if let Some(error) = &self.error {
            widgets.push(Widget::Error(error.clone()));
        }
        if self.has_failed() {
            widgets.push(Widget::Button {
                id: "retry",
                label: "Retry".to_string(),
            });
        }
        widgets
    }
}

//! Pages of the manage/update flow

use super::{save_install_data, OperationView};
use crate::ops::{OperationState, TaskEvent, TaskId, TaskOutput, UpdateCheck};
use crate::store::{Branch, Installation};
use crate::wizard::context::ManageTarget;
use crate::wizard::page::{Input, Page, PageCx, PageId, Widget};
use std::path::Path;

/// Record for `path`, which is either an installation directory or a game
/// executable. Unknown executables get a fresh record.
fn resolve_installation(cx: &PageCx<'_>, path: &Path) -> Option<Installation> {
    if let Some(installation) = cx.store.find(path) {
        return Some(installation.clone());
    }
    let dir = cx.installer.platform().install_dir_for(path).ok()?;
    if let Some(installation) = cx.store.find(&dir) {
        return Some(installation.clone());
    }
    let executable = path.file_name()?.to_string_lossy().into_owned();
    Some(Installation::new(dir, executable, "", Branch::Stable))
}

#[derive(Debug, Default)]
pub struct ManageSelectPage {
    targets: Vec<(ManageTarget, String)>,
    selected: Option<usize>,
}

impl Page for ManageSelectPage {
    fn id(&self) -> PageId {
        PageId::ManageSelect
    }

    fn enter(&mut self, cx: &mut PageCx<'_>) {
        let previous = self
            .selected
            .and_then(|i| self.targets.get(i))
            .map(|(target, _)| target.clone());

        self.targets.clear();
        if cx.store.suite_installed() {
            self.targets.push((ManageTarget::Cli, "Geode CLI".to_string()));
        }
        for installation in cx.store.installations() {
            let label = if installation.version.is_empty() {
                installation.path.display().to_string()
            } else {
                format!("{} ({})", installation.path.display(), installation.version)
            };
            self.targets
                .push((ManageTarget::Installation(installation.path.clone()), label));
        }

        self.selected = previous.and_then(|p| self.targets.iter().position(|(t, _)| *t == p));
    }

    fn leave(&mut self, cx: &mut PageCx<'_>) {
        if let Some((target, _)) = self.selected.and_then(|i| self.targets.get(i)) {
            cx.context.manage_target = Some(target.clone());
        }
    }

    fn can_continue(&self) -> bool {
        self.selected.is_some()
    }

    fn view(&self) -> Vec<Widget> {
        let mut widgets = vec![Widget::Text("Pick an installation to modify:".to_string())];
        if self.targets.is_empty() {
            widgets.push(Widget::Text("No installations of Geode found.".to_string()));
        } else {
            widgets.push(Widget::List {
                id: "target",
                items: self.targets.iter().map(|(_, label)| label.clone()).collect(),
                selected: self.selected,
            });
        }
        widgets
    }

    fn input(&mut self, widget: &str, input: Input, _cx: &mut PageCx<'_>) {
        if let ("target", Input::Select(i)) = (widget, input) {
            if i < self.targets.len() {
                self.selected = Some(i);
            }
        }
    }
}

/// Compares the installed version with the newest release
#[derive(Debug, Default)]
pub struct ManageCheckPage {
    op: OperationView,
    check: Option<UpdateCheck>,
    /// Target of the running or last check
    target: Option<ManageTarget>,
    cli: bool,
}

impl ManageCheckPage {
    fn start(&mut self, cx: &mut PageCx<'_>) {
        self.check = None;
        self.target = cx.context.manage_target.clone();
        let installer = cx.installer.clone();
        let task = match self.target.clone() {
            Some(ManageTarget::Cli) => {
                self.cli = true;
                cx.spawn(PageId::ManageCheck, move |reporter| async move {
                    installer
                        .check_cli_update(&reporter)
                        .await
                        .map(TaskOutput::UpdateChecked)
                })
            }
            Some(ManageTarget::Installation(path)) => {
                self.cli = false;
                let Some(installation) = resolve_installation(cx, &path) else {
                    self.op.fail(
                        "Installation not found",
                        format!("Error checking for updates: {} is not an installation", path.display()),
                    );
                    return;
                };
                cx.spawn(PageId::ManageCheck, move |reporter| async move {
                    installer
                        .check_loader_update(&installation, &reporter)
                        .await
                        .map(TaskOutput::UpdateChecked)
                })
            }
            None => {
                self.op.fail(
                    "Nothing selected",
                    "Error checking for updates: nothing was selected".to_string(),
                );
                return;
            }
        };
        self.op.begin(task);
        self.op
            .progress(OperationState::Connecting, "Checking for updates...".to_string());
    }
}

impl Page for ManageCheckPage {
    fn id(&self) -> PageId {
        PageId::ManageCheck
    }

    fn enter(&mut self, cx: &mut PageCx<'_>) {
        // a check still running for another target is abandoned; its events
        // no longer match the view's task
        if !self.op.is_running() || self.target != cx.context.manage_target {
            self.start(cx);
        }
    }

    fn can_continue(&self) -> bool {
        self.check.as_ref().is_some_and(|c| c.update_available())
    }

    fn view(&self) -> Vec<Widget> {
        let Some(check) = &self.check else {
            return self.op.widgets();
        };
        let current = if check.current.is_empty() {
            "unknown"
        } else {
            check.current.as_str()
        };
        let mut widgets = vec![Widget::Text(format!(
            "Installed version: {},\nAvailable version: {}",
            current, check.available
        ))];
        if check.nightly {
            widgets.push(Widget::Text(
                "Press \"Next\" to reinstall the newest nightly build.".to_string(),
            ));
        } else if check.update_available() {
            let what = if self.cli { "Geode CLI" } else { "Geode" };
            widgets.push(Widget::Text(format!("Press \"Next\" to update {}.", what)));
        } else {
            widgets.push(Widget::Text("You are up-to-date! :)".to_string()));
        }
        widgets
    }

    fn input(&mut self, widget: &str, input: Input, cx: &mut PageCx<'_>) {
        if widget == "retry" && input == Input::Activate && self.op.has_failed() {
            self.start(cx);
        }
    }

    fn on_task(&mut self, task: TaskId, event: TaskEvent, _cx: &mut PageCx<'_>) {
        if !self.op.owns(task) {
            return;
        }
        match event {
            TaskEvent::Progress { state, status } => self.op.progress(state, status),
            TaskEvent::Completed(TaskOutput::UpdateChecked(check)) => {
                tracing::info!(
                    current = %check.current,
                    available = %check.available,
                    "Update check finished"
                );
                self.check = Some(check);
                self.op.complete();
            }
            TaskEvent::Completed(other) => {
                tracing::warn!("Unexpected update check result {:?}", other);
            }
            TaskEvent::Failed(reason) => {
                let message = format!("Error checking for updates: {}", reason);
                self.op.fail(&reason, message);
            }
        }
    }
}

/// Installs the newest loader or CLI over the selected target
#[derive(Debug, Default)]
pub struct ManageUpdatePage {
    op: OperationView,
    cli: bool,
}

impl ManageUpdatePage {
    fn start(&mut self, cx: &mut PageCx<'_>) {
        let installer = cx.installer.clone();
        let task = match cx.context.manage_target.clone() {
            Some(ManageTarget::Cli) => {
                self.cli = true;
                cx.spawn(PageId::ManageUpdate, move |reporter| async move {
                    installer.update_cli(&reporter).await
                })
            }
            Some(ManageTarget::Installation(path)) => {
                self.cli = false;
                let Some(installation) = resolve_installation(cx, &path) else {
                    self.op.fail(
                        "Installation not found",
                        format!("Error updating Geode: {} is not an installation", path.display()),
                    );
                    return;
                };
                cx.spawn(PageId::ManageUpdate, move |reporter| async move {
                    installer
                        .update_installation(&installation, &reporter)
                        .await
                        .map(TaskOutput::GeodeInstalled)
                })
            }
            None => {
                self.op.fail(
                    "Nothing selected",
                    "Error updating Geode: nothing was selected".to_string(),
                );
                return;
            }
        };
        self.op.begin(task);
    }
}

impl Page for ManageUpdatePage {
    fn id(&self) -> PageId {
        PageId::ManageUpdate
    }

    fn enter(&mut self, cx: &mut PageCx<'_>) {
        if !self.op.is_running() && !self.op.is_done() {
            self.start(cx);
        }
    }

    fn can_continue(&self) -> bool {
        false
    }

    fn can_go_back(&self) -> bool {
        self.op.has_failed()
    }

    fn view(&self) -> Vec<Widget> {
        let title = if self.cli {
            "Updating Geode CLI"
        } else {
            "Updating installation"
        };
        let mut widgets = vec![Widget::Text(title.to_string())];
        widgets.extend(self.op.widgets());
        widgets
    }

    fn input(&mut self, widget: &str, input: Input, cx: &mut PageCx<'_>) {
        if widget == "retry" && input == Input::Activate && self.op.has_failed() {
            self.start(cx);
        }
    }

    fn on_task(&mut self, task: TaskId, event: TaskEvent, cx: &mut PageCx<'_>) {
        if !self.op.owns(task) {
            return;
        }
        match event {
            TaskEvent::Progress { state, status } => self.op.progress(state, status),
            TaskEvent::Completed(TaskOutput::GeodeInstalled(installation)) => {
                cx.store.add_or_update(installation);
                self.op.complete();
                cx.request_next(PageId::ManageUpdate);
            }
            TaskEvent::Completed(TaskOutput::CliInstalled { version }) => {
                tracing::info!("Geode CLI updated to {}", version);
                self.op.complete();
                cx.request_next(PageId::ManageUpdate);
            }
            TaskEvent::Completed(other) => {
                tracing::warn!("Unexpected update result {:?}", other);
            }
            TaskEvent::Failed(reason) => {
                let what = if self.cli { "the Geode CLI" } else { "Geode" };
                let message = format!(
                    "Error updating {}: {}. Try again, and if the problem persists, contact the Geode Development team for more help.",
                    what, reason
                );
                self.op.fail(&reason, message);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct ManageFinishedPage;

impl Page for ManageFinishedPage {
    fn id(&self) -> PageId {
        PageId::ManageFinished
    }

    fn enter(&mut self, cx: &mut PageCx<'_>) {
        save_install_data(cx);
    }

    fn can_go_back(&self) -> bool {
        false
    }

    fn view(&self) -> Vec<Widget> {
        vec![Widget::Text("Update complete!".to_string())]
    }
}

//! Pages of the developer tools flow

use super::{save_install_data, OperationView};
use crate::ops::{DevToolsRequest, TaskEvent, TaskId, TaskOutput};
use crate::store::Branch;
use crate::wizard::page::{Input, Page, PageCx, PageId, Widget};
use std::path::{Path, PathBuf};

const DOCS_URL: &str = "https://geode-sdk.github.io/docs";

/// A directory the SDK can be cloned into
fn usable_sdk_dir(path: &Path) -> bool {
    if path.as_os_str().is_empty() {
        return false;
    }
    if !path.exists() {
        return true;
    }
    path.is_dir()
        && std::fs::read_dir(path)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false)
}

#[derive(Debug, Default)]
pub struct DevInstallSelectSdkPage {
    path: String,
    initialized: bool,
}

impl Page for DevInstallSelectSdkPage {
    fn id(&self) -> PageId {
        PageId::DevInstallSelectSdk
    }

    fn enter(&mut self, cx: &mut PageCx<'_>) {
        if !self.initialized {
            let default = cx
                .context
                .sdk_dir
                .clone()
                .unwrap_or_else(|| cx.store.suite_directory().to_path_buf());
            self.path = default.display().to_string();
            self.initialized = true;
        }
    }

    fn leave(&mut self, cx: &mut PageCx<'_>) {
        cx.context.sdk_dir = Some(PathBuf::from(self.path.trim()));
    }

    fn can_continue(&self) -> bool {
        usable_sdk_dir(Path::new(self.path.trim()))
    }

    fn view(&self) -> Vec<Widget> {
        let mut widgets = vec![
            Widget::Text("Please select where to install the Geode SDK.".to_string()),
            Widget::TextInput {
                id: "path",
                label: "SDK directory".to_string(),
                value: self.path.clone(),
            },
        ];
        if !self.can_continue() {
            widgets.push(Widget::Warning(
                "Please select a path to a folder that doesn't exist yet or which is empty."
                    .to_string(),
            ));
        }
        widgets
    }

    fn input(&mut self, widget: &str, input: Input, _cx: &mut PageCx<'_>) {
        if let ("path", Input::Edit(value)) = (widget, input) {
            self.path = value;
        }
    }
}

const BRANCHES: [Branch; 2] = [Branch::Nightly, Branch::Stable];

#[derive(Debug, Default)]
pub struct DevInstallBranchPage {
    selected: usize,
}

impl Page for DevInstallBranchPage {
    fn id(&self) -> PageId {
        PageId::DevInstallBranch
    }

    fn leave(&mut self, cx: &mut PageCx<'_>) {
        cx.context.sdk_branch = BRANCHES[self.selected];
    }

    fn view(&self) -> Vec<Widget> {
        vec![
            Widget::Text("Which branch would you like to use for the Geode SDK?".to_string()),
            Widget::Text(
                "Nightly gets every change as soon as it is made, but may break from time to time. Stable only updates on releases and is what most mods are built against."
                    .to_string(),
            ),
            Widget::Choice {
                id: "branch",
                options: BRANCHES.iter().map(|b| b.display_name().to_string()).collect(),
                selected: self.selected,
            },
        ]
    }

    fn input(&mut self, widget: &str, input: Input, _cx: &mut PageCx<'_>) {
        if let ("branch", Input::Select(i)) = (widget, input) {
            if i < BRANCHES.len() {
                self.selected = i;
            }
        }
    }
}

#[derive(Debug)]
pub struct DevInstallAddToPathPage {
    add: bool,
}

impl Default for DevInstallAddToPathPage {
    fn default() -> Self {
        Self { add: true }
    }
}

impl Page for DevInstallAddToPathPage {
    fn id(&self) -> PageId {
        PageId::DevInstallAddToPath
    }

    fn leave(&mut self, cx: &mut PageCx<'_>) {
        cx.context.add_cli_to_path = self.add;
    }

    fn view(&self) -> Vec<Widget> {
        vec![
            Widget::Text(
                "Would you like to add the Geode CLI to your PATH? This lets you run the geode command from any terminal."
                    .to_string(),
            ),
            Widget::Toggle {
                id: "add",
                label: "Add CLI to Path".to_string(),
                checked: self.add,
            },
        ]
    }

    fn input(&mut self, widget: &str, input: Input, _cx: &mut PageCx<'_>) {
        if widget == "add" && input == Input::Toggle {
            self.add = !self.add;
        }
    }
}

/// Installs the CLI and clones the SDK suite
#[derive(Debug, Default)]
pub struct DevInstallPage {
    op: OperationView,
}

impl DevInstallPage {
    fn start(&mut self, cx: &mut PageCx<'_>) {
        let Some(sdk_dir) = cx.context.sdk_dir.clone() else {
            self.op.fail(
                "No SDK directory selected",
                "No SDK directory was selected. Go back and pick one.".to_string(),
            );
            return;
        };
        let request = DevToolsRequest {
            sdk_dir,
            branch: cx.context.sdk_branch,
            add_to_path: cx.context.add_cli_to_path,
        };
        let installer = cx.installer.clone();
        let task = cx.spawn(PageId::DevInstall, move |reporter| async move {
            installer.install_dev_tools(&request, &reporter).await
        });
        self.op.begin(task);
    }
}

impl Page for DevInstallPage {
    fn id(&self) -> PageId {
        PageId::DevInstall
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
        let mut widgets = vec![Widget::Text("Installing the Geode SDK...".to_string())];
        widgets.extend(self.op.widgets());
        widgets.push(Widget::Text(
            "Installing may take a while; please do not close the installer until it has finished."
                .to_string(),
        ));
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
            TaskEvent::Completed(TaskOutput::DevToolsInstalled {
                suite_dir,
                path_warning,
            }) => {
                cx.store.set_suite(suite_dir, true);
                if let Some(warning) = path_warning {
                    cx.warn("Environment not updated", warning);
                }
                self.op.complete();
                cx.request_next(PageId::DevInstall);
            }
            TaskEvent::Completed(other) => {
                tracing::warn!("Unexpected SDK install result {:?}", other);
            }
            TaskEvent::Failed(reason) => {
                let message = format!(
                    "Error installing the Geode SDK: {}. Try again, and if the problem persists, contact the Geode Development team for more help.",
                    reason
                );
                self.op.fail(&reason, message);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct DevInstallFinishedPage;

impl Page for DevInstallFinishedPage {
    fn id(&self) -> PageId {
        PageId::DevInstallFinished
    }

    fn enter(&mut self, cx: &mut PageCx<'_>) {
        save_install_data(cx);
    }

    fn can_go_back(&self) -> bool {
        false
    }

    fn view(&self) -> Vec<Widget> {
        vec![
            Widget::Text("The Geode SDK has been installed! Happy modding :)".to_string()),
            Widget::Link {
                id: "docs",
                label: "Read the Geode documentation".to_string(),
                url: DOCS_URL.to_string(),
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_sdk_dir() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(usable_sdk_dir(&tmp.path().join("missing")));
        assert!(usable_sdk_dir(tmp.path()));

        std::fs::write(tmp.path().join("file"), b"").unwrap();
        assert!(!usable_sdk_dir(tmp.path()));
        assert!(!usable_sdk_dir(&tmp.path().join("file")));
        assert!(!usable_sdk_dir(Path::new("")));
    }
}

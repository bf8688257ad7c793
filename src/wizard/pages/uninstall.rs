//! Pages of the uninstall flow

use super::OperationView;
use crate::ops::{TaskEvent, TaskId, TaskOutput, UninstallPlan, UninstallReport};
use crate::store::Installation;
use crate::wizard::page::{Input, Page, PageCx, PageId, Widget};
use std::path::PathBuf;

const UNINSTALL_OPTIONS: [&str; 2] = ["Uninstall everything", "Choose which parts to uninstall"];

#[derive(Debug, Default)]
pub struct UninstallStartPage {
    selected: usize,
}

impl Page for UninstallStartPage {
    fn id(&self) -> PageId {
        PageId::UninstallStart
    }

    fn leave(&mut self, cx: &mut PageCx<'_>) {
        cx.context.complete_uninstall = self.selected == 0;
    }

    fn view(&self) -> Vec<Widget> {
        vec![
            Widget::Text("What would you like to uninstall?".to_string()),
            Widget::Choice {
                id: "mode",
                options: UNINSTALL_OPTIONS.iter().map(|o| o.to_string()).collect(),
                selected: self.selected,
            },
        ]
    }

    fn input(&mut self, widget: &str, input: Input, _cx: &mut PageCx<'_>) {
        if let ("mode", Input::Select(i)) = (widget, input) {
            if i < UNINSTALL_OPTIONS.len() {
                self.selected = i;
            }
        }
    }
}

/// Picks the parts to remove; skipped for a complete uninstall
#[derive(Debug, Default)]
pub struct UninstallSelectPage {
    complete: bool,
    suite_available: bool,
    suite: bool,
    installations: Vec<(PathBuf, bool)>,
}

impl UninstallSelectPage {
    fn commit(&self, cx: &mut PageCx<'_>) {
        if self.complete {
            cx.context.uninstall_targets = cx
                .store
                .installations()
                .iter()
                .map(|i| i.path.clone())
                .collect();
            cx.context.uninstall_suite = cx.store.suite_installed();
        } else {
            cx.context.uninstall_targets = self
                .installations
                .iter()
                .filter(|(_, checked)| *checked)
                .map(|(path, _)| path.clone())
                .collect();
            cx.context.uninstall_suite = self.suite_available && self.suite;
        }
    }
}

impl Page for UninstallSelectPage {
    fn id(&self) -> PageId {
        PageId::UninstallSelect
    }

    fn enter(&mut self, cx: &mut PageCx<'_>) {
        self.complete = cx.context.complete_uninstall;
        self.suite_available = cx.store.suite_installed();

        let previous = std::mem::take(&mut self.installations);
        self.installations = cx
            .store
            .installations()
            .iter()
            .map(|i| {
                let checked = previous
                    .iter()
                    .any(|(path, checked)| *checked && *path == i.path);
                (i.path.clone(), checked)
            })
            .collect();

        if self.complete {
            self.commit(cx);
        }
    }

    fn leave(&mut self, cx: &mut PageCx<'_>) {
        self.commit(cx);
    }

    fn can_continue(&self) -> bool {
        self.complete
            || (self.suite_available && self.suite)
            || self.installations.iter().any(|(_, checked)| *checked)
    }

    fn should_skip(&self) -> bool {
        self.complete
    }

    fn view(&self) -> Vec<Widget> {
        let mut widgets = vec![Widget::Text(
            "Select which parts of Geode to uninstall:".to_string(),
        )];
        if self.suite_available {
            widgets.push(Widget::Toggle {
                id: "suite",
                label: "Uninstall Developer SDK".to_string(),
                checked: self.suite,
            });
        }
        if self.installations.is_empty() {
            widgets.push(Widget::Text("No installations of Geode found.".to_string()));
        } else {
            widgets.push(Widget::Checklist {
                id: "installations",
                items: self
                    .installations
                    .iter()
                    .map(|(path, checked)| (path.display().to_string(), *checked))
                    .collect(),
            });
        }
        widgets
    }

    fn input(&mut self, widget: &str, input: Input, _cx: &mut PageCx<'_>) {
        match (widget, input) {
            ("suite", Input::Toggle) if self.suite_available => self.suite = !self.suite,
            ("installations", Input::ToggleItem(i)) => {
                if let Some((_, checked)) = self.installations.get_mut(i) {
                    *checked = !*checked;
                }
            }
            _ => {}
        }
    }
}

#[derive(Debug)]
pub struct UninstallDeleteDataPage {
    delete: bool,
    complete: bool,
    skip: bool,
}

impl Default for UninstallDeleteDataPage {
    fn default() -> Self {
        Self {
            delete: true,
            complete: true,
            skip: false,
        }
    }
}

impl Page for UninstallDeleteDataPage {
    fn id(&self) -> PageId {
        PageId::UninstallDeleteData
    }

    fn enter(&mut self, cx: &mut PageCx<'_>) {
        self.complete = cx.context.complete_uninstall;
        // only the SDK was picked
        self.skip = cx.context.uninstall_targets.is_empty();
    }

    fn leave(&mut self, cx: &mut PageCx<'_>) {
        cx.context.delete_save_data = self.delete && !self.skip;
    }

    fn should_skip(&self) -> bool {
        self.skip
    }

    fn view(&self) -> Vec<Widget> {
        let what = if self.complete {
            "Geode"
        } else {
            "the selected parts"
        };
        vec![
            Widget::Text(format!(
                "Do you also want to delete all save data associated with {}? This includes every installed mod and its settings.",
                what
            )),
            Widget::Text(
                "Note that GDPS installations may share their Geode save data with the main game."
                    .to_string(),
            ),
            Widget::Toggle {
                id: "delete",
                label: "Delete save data".to_string(),
                checked: self.delete,
            },
        ]
    }

    fn input(&mut self, widget: &str, input: Input, _cx: &mut PageCx<'_>) {
        if widget == "delete" && input == Input::Toggle {
            self.delete = !self.delete;
        }
    }
}

/// Runs the removal in the background and applies it to the store
#[derive(Debug, Default)]
pub struct UninstallPage {
    op: OperationView,
    steps: usize,
    finished_steps: usize,
}

impl UninstallPage {
    fn start(&mut self, cx: &mut PageCx<'_>) {
        let installations: Vec<Installation> = cx
            .context
            .uninstall_targets
            .iter()
            .filter_map(|path| cx.store.find(path).cloned())
            .collect();
        let plan = UninstallPlan {
            installations,
            delete_save_data: cx.context.delete_save_data,
            suite_dir: cx
                .context
                .uninstall_suite
                .then(|| cx.store.suite_directory().to_path_buf()),
            remove_cli: cx.context.complete_uninstall,
        };
        self.steps = plan.steps().max(1);
        self.finished_steps = 0;

        let installer = cx.installer.clone();
        let task = cx.spawn(PageId::Uninstall, move |reporter| async move {
            installer.uninstall(plan, &reporter).await
        });
        self.op.begin(task);
        self.op.step("Uninstalling Geode...".to_string(), 0);
    }

    fn apply(&mut self, report: UninstallReport, cx: &mut PageCx<'_>) {
        let mut errors = report.errors;
        for path in &report.removed {
            cx.store.forget(path);
        }
        if report.suite_removed {
            let suite_dir = cx.store.suite_directory().to_path_buf();
            cx.store.set_suite(suite_dir, false);
        }

        if cx.context.complete_uninstall {
            if let Err(e) = cx.store.delete() {
                errors.push(format!("Unable to delete installer data: {}", e));
            }
        } else if let Err(e) = cx.store.save() {
            errors.push(format!("Unable to save installer data: {}", e));
        }

        for error in errors {
            cx.error("Uninstall error", error);
        }
    }
}

impl Page for UninstallPage {
    fn id(&self) -> PageId {
        PageId::Uninstall
    }

    fn enter(&mut self, cx: &mut PageCx<'_>) {
        if self.op.is_idle() {
            self.start(cx);
        }
    }

    fn can_continue(&self) -> bool {
        self.op.is_done()
    }

    fn can_go_back(&self) -> bool {
        false
    }

    fn view(&self) -> Vec<Widget> {
        let mut widgets = vec![Widget::Text("Uninstalling...".to_string())];
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
            TaskEvent::Progress { status, .. } => {
                let percent = self.finished_steps * 100 / self.steps;
                self.finished_steps += 1;
                self.op.step(status, percent.min(100) as u16);
            }
            TaskEvent::Completed(TaskOutput::Uninstalled(report)) => {
                tracing::info!(
                    removed = report.removed.len(),
                    errors = report.errors.len(),
                    "Uninstall finished"
                );
                self.apply(report, cx);
                self.op.complete();
            }
            TaskEvent::Completed(other) => {
                tracing::warn!("Unexpected uninstall result {:?}", other);
            }
            TaskEvent::Failed(reason) => {
                let message = format!("Error uninstalling Geode: {}", reason);
                self.op.fail(&reason, message);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct UninstallFinishedPage {
    complete: bool,
}

impl Page for UninstallFinishedPage {
    fn id(&self) -> PageId {
        PageId::UninstallFinished
    }

    fn enter(&mut self, cx: &mut PageCx<'_>) {
        self.complete = cx.context.complete_uninstall;
    }

    fn can_go_back(&self) -> bool {
        false
    }

    fn view(&self) -> Vec<Widget> {
        let what = if self.complete {
            "Geode should now be removed from your computer"
        } else {
            "the selected parts should now be removed"
        };
        vec![
            Widget::Text(format!("Uninstalling finished! {} :)", what)),
            Widget::Text(
                "If you find parts of Geode still lurking around, you can safely delete them by hand."
                    .to_string(),
            ),
        ]
    }
}

//! Page contract, page identifiers and the view model pages render to

use super::context::WizardContext;
use super::structure::InstallType;
use super::tasks::Tasks;
use crate::error::Result;
use crate::ops::{Installer, Reporter, TaskEvent, TaskId, TaskOutput};
use crate::store::InstallationStore;
use std::collections::VecDeque;
use std::future::Future;

/// Every page the wizard knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PageId {
    NotFound,
    Start,
    FirstStart,
    Eula,
    InstallGdpsInfo,
    InstallSelectGd,
    InstallOptBeta,
    InstallCheckMods,
    Install,
    InstallFinished,
    DevInstallSelectSdk,
    DevInstallBranch,
    DevInstallAddToPath,
    DevInstall,
    DevInstallFinished,
    UninstallStart,
    UninstallSelect,
    UninstallDeleteData,
    Uninstall,
    UninstallFinished,
    ManageSelect,
    ManageCheck,
    ManageUpdate,
    ManageFinished,
}

/// One element of a page's view model
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Widget {
    Text(String),
    Error(String),
    Warning(String),
    /// One-of selection
    Choice {
        id: &'static str,
        options: Vec<String>,
        selected: usize,
    },
    Toggle {
        id: &'static str,
        label: String,
        checked: bool,
    },
    TextInput {
        id: &'static str,
        label: String,
        value: String,
    },
    Progress {
        status: String,
        percent: u16,
    },
    /// Many-of selection
    Checklist {
        id: &'static str,
        items: Vec<(String, bool)>,
    },
    List {
        id: &'static str,
        items: Vec<String>,
        selected: Option<usize>,
    },
    Button {
        id: &'static str,
        label: String,
    },
    Link {
        id: &'static str,
        label: String,
        url: String,
    },
}

impl Widget {
    /// Identifier of interactive widgets
    pub fn id(&self) -> Option<&'static str> {
        match self {
            Widget::Choice { id, .. }
            | Widget::Toggle { id, .. }
            | Widget::TextInput { id, .. }
            | Widget::Checklist { id, .. }
            | Widget::List { id, .. }
            | Widget::Button { id, .. }
            | Widget::Link { id, .. } => Some(*id),
            Widget::Text(_) | Widget::Error(_) | Widget::Warning(_) | Widget::Progress { .. } => {
                None
            }
        }
    }
}

/// User input directed at one widget
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Toggle,
    Select(usize),
    ToggleItem(usize),
    /// Full new value of a text input
    Edit(String),
    Activate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// Blocking message shown on top of the current page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

/// Something a page asks the engine to do after the current call returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Request {
    /// Advance, honored only while `from` is still current
    Next { from: PageId },
    Structure(InstallType),
}

/// Everything a page may touch while handling a hook
pub struct PageCx<'a> {
    pub store: &'a mut InstallationStore,
    pub installer: &'a Installer,
    pub context: &'a mut WizardContext,
    pub(crate) tasks: &'a mut Tasks,
    pub(crate) notices: &'a mut VecDeque<Notice>,
    pub(crate) requests: &'a mut Vec<Request>,
}

impl PageCx<'_> {
    /// Run an operation in the background. Its events come back through
    /// [`Page::on_task`] of `page`.
    pub fn spawn<F, Fut>(&mut self, page: PageId, op: F) -> TaskId
    where
        F: FnOnce(Reporter) -> Fut,
        Fut: Future<Output = Result<TaskOutput>> + Send + 'static,
    {
        self.tasks.spawn(page, op)
    }

    pub fn request_next(&mut self, from: PageId) {
        self.requests.push(Request::Next { from });
    }

    pub fn request_structure(&mut self, install_type: InstallType) {
        self.context.install_type = install_type;
        self.requests.push(Request::Structure(install_type));
    }

    fn notify(&mut self, level: NoticeLevel, title: &str, message: String) {
        self.notices.push_back(Notice {
            level,
            title: title.to_string(),
            message,
        });
    }

    pub fn error(&mut self, title: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}: {}", title, message);
        self.notify(NoticeLevel::Error, title, message);
    }

    pub fn warn(&mut self, title: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}: {}", title, message);
        self.notify(NoticeLevel::Warning, title, message);
    }

    pub fn info(&mut self, title: &str, message: impl Into<String>) {
        self.notify(NoticeLevel::Info, title, message.into());
    }
}

/// One wizard step.
///
/// `enter` runs every time the page becomes current, `leave` every time it
/// stops being current. The predicates are polled by the engine after each
/// hook and input.
pub trait Page {
    fn id(&self) -> PageId;

    fn enter(&mut self, _cx: &mut PageCx<'_>) {}

    fn leave(&mut self, _cx: &mut PageCx<'_>) {}

    fn can_continue(&self) -> bool {
        true
    }

    fn can_go_back(&self) -> bool {
        true
    }

    /// Bypass this page in the current navigation direction
    fn should_skip(&self) -> bool {
        false
    }

    fn view(&self) -> Vec<Widget>;

    fn input(&mut self, _widget: &str, _input: Input, _cx: &mut PageCx<'_>) {}

    fn on_task(&mut self, _task: TaskId, _event: TaskEvent, _cx: &mut PageCx<'_>) {}
}

//! Long-running operation model
//!
//! Every background operation moves through
//! `Idle -> Connecting -> Downloading(0-100) -> Installing -> Completed | Failed`
//! and reports back over a channel read by the UI thread.

use super::version;
use crate::store::Installation;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

/// Identifier of one spawned operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

/// Operation status
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OperationState {
    #[default]
    Idle,
    Connecting,
    Downloading(u8),
    Installing,
    Completed,
    Failed(String),
}

impl OperationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationState::Idle => "idle",
            OperationState::Connecting => "connecting",
            OperationState::Downloading(_) => "downloading",
            OperationState::Installing => "installing",
            OperationState::Completed => "completed",
            OperationState::Failed(_) => "failed",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(
            self,
            OperationState::Completed | OperationState::Failed(_)
        )
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self,
            OperationState::Connecting | OperationState::Downloading(_) | OperationState::Installing
        )
    }
}

/// Result of a finished operation, applied on the UI thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutput {
    /// Loader and API unpacked; the record still has to be stored
    GeodeInstalled(Installation),
    CliInstalled { version: String },
    DevToolsInstalled {
        suite_dir: PathBuf,
        /// Set when adding the CLI to PATH failed; the install itself succeeded
        path_warning: Option<String>,
    },
    UpdateChecked(UpdateCheck),
    Uninstalled(UninstallReport),
}

/// What an uninstall removed. Failed steps don't stop the following ones.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UninstallReport {
    /// Installation directories the loader was removed from
    pub removed: Vec<PathBuf>,
    pub suite_removed: bool,
    pub errors: Vec<String>,
}

/// Installed vs. available version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCheck {
    pub current: String,
    pub available: String,
    /// Nightly builds share one tag, so they are always offered again
    pub nightly: bool,
}

impl UpdateCheck {
    pub fn update_available(&self) -> bool {
        self.nightly || version::is_newer(&self.current, &self.available)
    }
}

/// One event of one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    Progress { state: OperationState, status: String },
    Completed(TaskOutput),
    Failed(String),
}

impl TaskEvent {
    pub fn state(&self) -> OperationState {
        match self {
            TaskEvent::Progress { state, .. } => state.clone(),
            TaskEvent::Completed(_) => OperationState::Completed,
            TaskEvent::Failed(reason) => OperationState::Failed(reason.clone()),
        }
    }
}

/// Event tagged with the operation it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskMessage {
    pub task: TaskId,
    pub event: TaskEvent,
}

/// Coalesces high-frequency progress updates
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// True when an update may be forwarded now
    pub fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Progress sink handed to running operations.
///
/// Terminal events are not sent from here; the spawner sends exactly one
/// `Completed` or `Failed` when the operation's future resolves.
#[derive(Clone)]
pub struct Reporter {
    task: TaskId,
    tx: Option<UnboundedSender<TaskMessage>>,
    throttle: Arc<Mutex<ProgressThrottle>>,
    span: (u8, u8),
}

impl Reporter {
    pub fn new(task: TaskId, tx: UnboundedSender<TaskMessage>, interval: Duration) -> Self {
        Self {
            task,
            tx: Some(tx),
            throttle: Arc::new(Mutex::new(ProgressThrottle::new(interval))),
            span: (0, 100),
        }
    }

    /// Reporter that drops every event
    pub fn detached() -> Self {
        Self {
            task: TaskId(0),
            tx: None,
            throttle: Arc::new(Mutex::new(ProgressThrottle::new(Duration::ZERO))),
            span: (0, 100),
        }
    }

    /// Map this stage's 0-100 onto `start..end` of the overall bar
    pub fn scoped(&self, start: u8, end: u8) -> Self {
        let mut scoped = self.clone();
        scoped.span = (start.min(100), end.clamp(start.min(100), 100));
        scoped
    }

    pub fn task(&self) -> TaskId {
        self.task
    }

    fn send(&self, state: OperationState, status: String) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(TaskMessage {
                task: self.task,
                event: TaskEvent::Progress { state, status },
            });
        }
    }

    fn throttled(&self) -> bool {
        self.throttle.lock().map(|mut t| t.ready()).unwrap_or(true)
    }

    fn scale(&self, percent: u8) -> u8 {
        let (start, end) = self.span;
        let width = u16::from(end - start);
        start + (u16::from(percent.min(100)) * width / 100) as u8
    }

    pub fn connecting(&self, status: impl Into<String>) {
        self.send(OperationState::Connecting, status.into());
    }

    /// Byte progress of a download. Unknown sizes report 0%.
    pub fn downloading(&self, label: &str, received: u64, total: Option<u64>) {
        let (percent, text) = match total {
            Some(total) if total > 0 => {
                let pct = (received.saturating_mul(100) / total).min(100) as u8;
                (pct, "Downloading")
            }
            _ => (0, "Beginning download"),
        };

        let finished = total.is_some_and(|t| received >= t);
        if received == 0 || finished || self.throttled() {
            self.send(
                OperationState::Downloading(self.scale(percent)),
                format!("{}: {}", label, text),
            );
        }
    }

    pub fn installing(&self, status: impl Into<String>) {
        self.send(OperationState::Installing, status.into());
    }

    /// Output of a long-running step; coalesced
    pub fn installing_output(&self, line: impl Into<String>) {
        if self.throttled() {
            self.installing(line);
        }
    }

    /// Archive extraction progress. Coalesced, except for the last entry.
    pub fn unpacking(&self, label: &str, entry: &str, done: usize, total: usize) {
        if done >= total || self.throttled() {
            self.installing(format!(
                "{}: Unpacking {} ({}/{})",
                label, entry, done, total
            ));
        }
    }
}

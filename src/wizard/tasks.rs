//! Background operations and the channel that brings their events back to
//! the UI thread

use super::page::PageId;
use crate::error::Result;
use crate::ops::{Reporter, TaskEvent, TaskId, TaskMessage, TaskOutput};
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Spawns operations onto the runtime and routes their events to the page
/// that started them
pub struct Tasks {
    handle: Handle,
    tx: UnboundedSender<TaskMessage>,
    rx: UnboundedReceiver<TaskMessage>,
    next_id: u64,
    owners: HashMap<TaskId, PageId>,
    interval: Duration,
}

impl Tasks {
    /// `interval` rate-limits progress forwarded by each operation
    pub fn new(handle: Handle, interval: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            handle,
            tx,
            rx,
            next_id: 0,
            owners: HashMap::new(),
            interval,
        }
    }

    /// Start `op`. Exactly one `Completed` or `Failed` event follows its
    /// progress events, also when `op` panics.
    pub fn spawn<F, Fut>(&mut self, page: PageId, op: F) -> TaskId
    where
        F: FnOnce(Reporter) -> Fut,
        Fut: Future<Output = Result<TaskOutput>> + Send + 'static,
    {
        self.next_id += 1;
        let task = TaskId(self.next_id);
        let reporter = Reporter::new(task, self.tx.clone(), self.interval);
        let tx = self.tx.clone();
        let fut = op(reporter);

        self.handle.spawn(async move {
            let event = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(output)) => TaskEvent::Completed(output),
                Ok(Err(e)) => {
                    tracing::error!(task = task.0, "Operation failed: {}", e);
                    TaskEvent::Failed(e.to_string())
                }
                Err(panic) => {
                    let reason = panic_message(panic.as_ref());
                    tracing::error!(task = task.0, "Operation panicked: {}", reason);
                    TaskEvent::Failed(format!("Internal error: {}", reason))
                }
            };
            let _ = tx.send(TaskMessage { task, event });
        });

        tracing::debug!(task = task.0, ?page, "Spawned operation");
        self.owners.insert(task, page);
        task
    }

    pub fn try_recv(&mut self) -> Option<TaskMessage> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next event. The sender half lives in `self`, so this
    /// only returns `None` if the runtime is gone.
    pub async fn recv(&mut self) -> Option<TaskMessage> {
        self.rx.recv().await
    }

    /// Page that owns the message's operation. Terminal events release it.
    pub fn route(&mut self, msg: &TaskMessage) -> Option<PageId> {
        let owner = self.owners.get(&msg.task).copied();
        if msg.event.state().is_final() {
            self.owners.remove(&msg.task);
        }
        owner
    }

    pub fn has_running(&self) -> bool {
        !self.owners.is_empty()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

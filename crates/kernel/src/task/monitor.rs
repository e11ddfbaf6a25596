use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::sync::lock;

/// Lifecycle of a monitored task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MonitorState {
    /// Created, never submitted.
    None,
    /// Sitting in the deadline queue.
    Scheduled,
    /// Cancelled before dispatch; the run-step will not be invoked.
    Cancelled,
    /// Handed to a worker. Terminal.
    Processed,
}

/// Outcome of the scheduler's pre-dispatch claim on a monitored task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// Transitioned to `Processed` by this claim; subscribers must be fired.
    Claimed,
    /// Already `Processed` by an earlier cycle of a repeating job.
    AlreadyProcessed,
    /// Cancelled; discard without running.
    Cancelled,
}

type Subscriber = Box<dyn FnOnce() + Send + 'static>;

struct Inner {
    state: MonitorState,
    subscribers: Vec<Subscriber>,
}

/// Shared handle exposing cancellation and the one-shot "processed"
/// notification of a monitored task. Cheap to clone.
#[derive(Clone)]
pub struct TaskMonitor {
    inner: Arc<Mutex<Inner>>,
}

impl std::fmt::Debug for TaskMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskMonitor")
            .field("state", &self.state())
            .finish()
    }
}

impl Default for TaskMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskMonitor {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: MonitorState::None,
                subscribers: Vec::new(),
            })),
        }
    }

    pub fn state(&self) -> MonitorState {
        lock(&self.inner).state
    }

    pub fn is_cancelled(&self) -> bool {
        self.state() == MonitorState::Cancelled
    }

    pub fn is_processed(&self) -> bool {
        self.state() == MonitorState::Processed
    }

    /// Request cancellation. Returns `false` (and changes nothing) once the
    /// task has been processed.
    pub fn cancel(&self) -> bool {
        let mut inner = lock(&self.inner);
        match inner.state {
            MonitorState::Processed => false,
            _ => {
                inner.state = MonitorState::Cancelled;
                // nothing will ever fire them
                inner.subscribers.clear();
                true
            }
        }
    }

    /// Run `f` once the task is processed. Fires immediately, on the calling
    /// thread, when that has already happened. Never fires for a cancelled task.
    pub fn on_processed<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut inner = lock(&self.inner);
        match inner.state {
            MonitorState::Processed => {
                drop(inner);
                f();
            }
            MonitorState::Cancelled => {}
            _ => inner.subscribers.push(Box::new(f)),
        }
    }

    pub(crate) fn mark_scheduled(&self) {
        let mut inner = lock(&self.inner);
        if inner.state == MonitorState::None {
            inner.state = MonitorState::Scheduled;
        }
    }

    /// Atomically check for cancellation and move to `Processed`.
    pub(crate) fn claim(&self) -> Claim {
        let mut inner = lock(&self.inner);
        match inner.state {
            MonitorState::Cancelled => Claim::Cancelled,
            MonitorState::Processed => Claim::AlreadyProcessed,
            MonitorState::None | MonitorState::Scheduled => {
                inner.state = MonitorState::Processed;
                Claim::Claimed
            }
        }
    }

    /// Fire pending subscribers outside the lock. Each subscriber runs at
    /// most once because the list is drained.
    pub(crate) fn fire_processed(&self) {
        let subscribers = std::mem::take(&mut lock(&self.inner).subscribers);
        for subscriber in subscribers {
            subscriber();
        }
    }
}

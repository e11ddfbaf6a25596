use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::TaskError;
use crate::kernel::KernelHandle;
use crate::sync::lock;

use super::callback::FnTask;
use super::monitor::TaskMonitor;
use super::repeat::RepeatPolicy;
use super::Task;

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique job identifier. Every cycle of a repeating job keeps the
/// id of the job it was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    fn next() -> Self {
        Self(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

enum Work {
    /// One-shot: moved into the queue, then into the worker.
    Owned(Box<dyn Task>),
    /// Repeating: every cycle shares the same task state.
    Shared(Arc<Mutex<Box<dyn Task>>>),
}

/// A task plus its optional capabilities, ready for submission.
pub struct Job {
    id: JobId,
    name: Arc<str>,
    latency: Duration,
    work: Work,
    monitor: Option<TaskMonitor>,
    repeat: Option<RepeatPolicy>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("latency", &self.latency)
            .field("monitor", &self.monitor)
            .field("repeat", &self.repeat)
            .finish()
    }
}

impl Job {
    pub fn new<T: Task>(task: T) -> Self {
        Self::from_boxed(Box::new(task))
    }

    pub fn from_boxed(task: Box<dyn Task>) -> Self {
        Self {
            id: JobId::next(),
            name: Arc::from(task.name()),
            latency: task.expected_latency(),
            work: Work::Owned(task),
            monitor: None,
            repeat: None,
        }
    }

    /// Job around an infallible closure.
    pub fn from_fn<F>(name: impl Into<String>, latency: Duration, mut f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self::new(FnTask::new(name, latency, move || {
            f();
            Ok(())
        }))
    }

    /// Attach a monitor (cancellation + processed notification).
    pub fn with_monitor(mut self, monitor: TaskMonitor) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Attach a fresh monitor and return a handle to it.
    pub fn monitored(self) -> (Self, TaskMonitor) {
        let monitor = TaskMonitor::new();
        (self.with_monitor(monitor.clone()), monitor)
    }

    /// Make the job repeating under `policy`.
    pub fn with_repeat(mut self, policy: RepeatPolicy) -> Self {
        self.work = match self.work {
            Work::Owned(task) => Work::Shared(Arc::new(Mutex::new(task))),
            shared @ Work::Shared(_) => shared,
        };
        self.repeat = Some(policy);
        self
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn expected_latency(&self) -> Duration {
        self.latency
    }

    pub fn monitor(&self) -> Option<&TaskMonitor> {
        self.monitor.as_ref()
    }

    pub fn repeat(&self) -> Option<&RepeatPolicy> {
        self.repeat.as_ref()
    }

    pub fn is_cancelled(&self) -> bool {
        self.monitor.as_ref().is_some_and(TaskMonitor::is_cancelled)
    }

    /// Readiness for dispatch. Non-repeating jobs are always ready.
    pub fn is_ready(&self, now: Instant) -> bool {
        self.repeat.as_ref().map_or(true, |r| r.is_ready(now))
    }

    /// Submit to the kernel with the job's own latency budget.
    pub fn submit(self, kernel: &KernelHandle) -> bool {
        kernel.schedule(self)
    }

    /// Another submission of the same repeating job, sharing its task state,
    /// monitor and policy. The scheduler uses it for the next cycle; producers
    /// use it to signal the job again (a no-op while an entry is queued).
    /// `None` for one-shot or stopped jobs.
    pub fn next_cycle(&self) -> Option<Job> {
        let repeat = self.repeat.as_ref()?;
        if repeat.is_stopped() {
            return None;
        }
        let Work::Shared(task) = &self.work else {
            return None;
        };
        Some(Job {
            id: self.id,
            name: Arc::clone(&self.name),
            latency: self.latency,
            work: Work::Shared(Arc::clone(task)),
            monitor: self.monitor.clone(),
            repeat: Some(repeat.clone()),
        })
    }

    /// Invoke the run-step, converting a panic into [`TaskError::Panicked`].
    pub fn run_step(self) -> Result<(), TaskError> {
        let result = match self.work {
            Work::Owned(mut task) => panic::catch_unwind(AssertUnwindSafe(|| task.run())),
            Work::Shared(task) => {
                panic::catch_unwind(AssertUnwindSafe(|| lock(&task).run()))
            }
        };
        result.unwrap_or_else(|payload| Err(TaskError::from_panic(payload)))
    }
}

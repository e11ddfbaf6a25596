//! Task capability model.
//!
//! A [`Task`] is the schedulable unit: a run-step plus an expected latency.
//! Producers wrap it in a [`Job`], optionally attaching the two orthogonal
//! capabilities:
//!
//! - [`TaskMonitor`]: cancellation before dispatch and a one-shot
//!   "processed" notification.
//! - [`RepeatPolicy`]: a minimum interval and readiness gate; the job
//!   re-submits itself after every run until stopped.

mod callback;
mod job;
mod monitor;
mod repeat;

use std::time::Duration;

pub use callback::FnTask;
pub use job::{Job, JobId};
pub use monitor::{Claim, MonitorState, TaskMonitor};
pub use repeat::RepeatPolicy;

use crate::error::TaskError;

/// Latency budget used when a task kind does not state its own.
pub const DEFAULT_EXPECTED_LATENCY: Duration = Duration::from_millis(500);

/// A unit of work the kernel can run.
///
/// Implementations are produced outside the kernel (input translation,
/// output actions, periodic jobs) and are opaque to it: the kernel only
/// orders them by deadline and calls [`run`](Task::run) on a worker.
pub trait Task: Send + 'static {
    /// Human-readable name for logging and metrics.
    fn name(&self) -> &str;

    /// Budget from submission to start, used to compute the deadline when
    /// the submitter gives no explicit latency.
    fn expected_latency(&self) -> Duration {
        DEFAULT_EXPECTED_LATENCY
    }

    /// The run-step. Errors and panics are caught and logged by the worker.
    fn run(&mut self) -> Result<(), TaskError>;
}

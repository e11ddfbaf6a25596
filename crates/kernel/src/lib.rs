//! Real-time task kernel.
//!
//! Producers build [`Job`]s and submit them through a [`KernelHandle`]. The
//! scheduler thread moves the earliest-deadline ready job from the
//! [`DeadlineQueue`] to an idle slot of the [`WorkerPool`], blocking while
//! every slot is busy. Work that must happen at an exact instant goes to the
//! precision thread through [`KernelHandle::schedule_at`].

pub mod error;
pub mod kernel;
pub mod metrics;
pub mod pool;
pub mod queue;
pub mod scheduler;
mod sync;
pub mod task;
pub mod threads;
pub mod timed;
pub mod waiter;

pub use error::{KernelError, TaskError};
pub use kernel::{Kernel, KernelHandle, ShutdownReport};
pub use metrics::{KernelMetrics, SharedMetrics};
pub use pool::{PoolOptions, WorkerPool};
pub use queue::DeadlineQueue;
pub use scheduler::{Scheduler, StepOutcome};
pub use task::{
    FnTask, Job, JobId, MonitorState, RepeatPolicy, Task, TaskMonitor,
    DEFAULT_EXPECTED_LATENCY,
};
pub use threads::ThreadRegistry;
pub use timed::TimedQueue;
pub use waiter::PrecisionWaiter;

pub use tactus_core::{KernelConfig, LatencyClass};

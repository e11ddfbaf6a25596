//! Scheduler loop -- moves the most urgent ready job from the deadline queue
//! to the worker pool.
//!
//! Split into focused submodules:
//! - `core`: Scheduler struct, constructor and accessors
//! - `execution`: the single-step selection/dispatch logic and the main loop

mod core;
mod execution;
#[cfg(test)]
mod tests;

pub use self::core::Scheduler;
pub use self::execution::StepOutcome;

/// Name of the scheduler thread.
pub const SCHEDULER_THREAD_NAME: &str = "tactus-scheduler";

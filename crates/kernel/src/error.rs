use thiserror::Error;

use tactus_core::TactusError;

/// Errors raised by the kernel itself. Task failures never surface here;
/// they are logged at the worker boundary as [`TaskError`].
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("failed to spawn thread '{name}': {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("worker pool is shut down")]
    PoolShutDown,

    #[error(transparent)]
    Config(#[from] TactusError),
}

/// Failure reported by a task's run-step.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    #[error("task failed: {0}")]
    Failed(String),

    #[error("output sink error: {0}")]
    Sink(String),

    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Build a [`TaskError::Panicked`] from a `catch_unwind` payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        TaskError::Panicked(msg)
    }
}

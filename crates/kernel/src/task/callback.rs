use std::time::Duration;

use crate::error::TaskError;

use super::Task;

/// Generic scheduled callback: a named closure with a latency budget.
pub struct FnTask<F> {
    name: String,
    latency: Duration,
    f: F,
}

impl<F> FnTask<F>
where
    F: FnMut() -> Result<(), TaskError> + Send + 'static,
{
    pub fn new(name: impl Into<String>, latency: Duration, f: F) -> Self {
        Self {
            name: name.into(),
            latency,
            f,
        }
    }
}

impl<F> Task for FnTask<F>
where
    F: FnMut() -> Result<(), TaskError> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn expected_latency(&self) -> Duration {
        self.latency
    }

    fn run(&mut self) -> Result<(), TaskError> {
        (self.f)()
    }
}

impl<F> std::fmt::Debug for FnTask<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTask")
            .field("name", &self.name)
            .field("latency", &self.latency)
            .finish()
    }
}

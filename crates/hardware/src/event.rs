//! Hardware input events and the task that delivers them.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tactus_kernel::{Task, TaskError};

use crate::coord::Coordinate;
use crate::signal::RawSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputEventKind {
    Press,
    Release,
    DoubleClick,
    ValueChange,
}

impl InputEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Press => "press",
            Self::Release => "release",
            Self::DoubleClick => "double_click",
            Self::ValueChange => "value_change",
        }
    }
}

/// A classified input event. Carries the raw signal that caused it for
/// diagnostics.
#[derive(Debug, Clone)]
pub struct InputEvent {
    pub kind: InputEventKind,
    pub coord: Coordinate,
    pub value: i32,
    pub interface: &'static str,
    pub cause: RawSignal,
}

/// Consumer of input events. Runs on a kernel worker.
pub trait InputHandler: Send + Sync + 'static {
    fn handle(&self, event: &InputEvent) -> Result<(), TaskError>;
}

impl<F> InputHandler for F
where
    F: Fn(&InputEvent) -> Result<(), TaskError> + Send + Sync + 'static,
{
    fn handle(&self, event: &InputEvent) -> Result<(), TaskError> {
        self(event)
    }
}

/// Delivers one [`InputEvent`] to a handler.
pub struct InputTask {
    name: String,
    event: InputEvent,
    handler: Arc<dyn InputHandler>,
    latency: Duration,
}

impl InputTask {
    pub fn new(event: InputEvent, handler: Arc<dyn InputHandler>, latency: Duration) -> Self {
        Self {
            name: format!("input.{}", event.kind.name()),
            event,
            handler,
            latency,
        }
    }

    pub fn event(&self) -> &InputEvent {
        &self.event
    }
}

impl Task for InputTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn expected_latency(&self) -> Duration {
        self.latency
    }

    fn run(&mut self) -> Result<(), TaskError> {
        self.handler.handle(&self.event)
    }
}

impl std::fmt::Debug for InputTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputTask")
            .field("name", &self.name)
            .field("event", &self.event)
            .field("latency", &self.latency)
            .finish()
    }
}

//! Hardware output actions.
//!
//! An [`OutputTask`] performs one [`OutputAction`] against an [`OutputSink`]
//! on a kernel worker. Clock ticks must land on an exact instant and go to
//! the precision thread; everything else is latency-budgeted.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tactus_kernel::{Job, KernelHandle, LatencyClass, Task, TaskError};

use crate::coord::Coordinate;

/// Device-facing side effect. The kernel places no contract on it beyond
/// reporting failure.
pub trait OutputSink: Send + Sync + 'static {
    fn send(&self, coord: Coordinate, value: i32, source_tag: &str) -> Result<(), TaskError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OutputAction {
    SetIndicator { coord: Coordinate, value: i32 },
    ClockTick { beat: u64 },
    ScrollViewport { offset: Coordinate },
}

impl OutputAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetIndicator { .. } => "output.set_indicator",
            Self::ClockTick { .. } => "output.clock_tick",
            Self::ScrollViewport { .. } => "output.scroll_viewport",
        }
    }

    pub fn latency_class(&self) -> LatencyClass {
        match self {
            Self::SetIndicator { .. } => LatencyClass::Background,
            Self::ClockTick { .. } | Self::ScrollViewport { .. } => LatencyClass::Interactive,
        }
    }

    fn payload(&self) -> (Coordinate, i32) {
        match *self {
            Self::SetIndicator { coord, value } => (coord, value),
            Self::ClockTick { beat } => {
                (Coordinate::ORIGIN, i32::try_from(beat).unwrap_or(i32::MAX))
            }
            Self::ScrollViewport { offset } => (offset, 0),
        }
    }
}

pub struct OutputTask {
    action: OutputAction,
    sink: Arc<dyn OutputSink>,
    source_tag: Arc<str>,
    latency: Duration,
}

impl OutputTask {
    pub fn new(
        action: OutputAction,
        sink: Arc<dyn OutputSink>,
        source_tag: Arc<str>,
        latency: Duration,
    ) -> Self {
        Self {
            action,
            sink,
            source_tag,
            latency,
        }
    }

    pub fn action(&self) -> OutputAction {
        self.action
    }
}

impl Task for OutputTask {
    fn name(&self) -> &str {
        self.action.name()
    }

    fn expected_latency(&self) -> Duration {
        self.latency
    }

    fn run(&mut self) -> Result<(), TaskError> {
        let (coord, value) = self.action.payload();
        self.sink.send(coord, value, &self.source_tag)
    }
}

/// Submits output actions for one source against one sink.
#[derive(Clone)]
pub struct OutputPort {
    kernel: KernelHandle,
    sink: Arc<dyn OutputSink>,
    source_tag: Arc<str>,
}

impl OutputPort {
    pub fn new(kernel: KernelHandle, sink: Arc<dyn OutputSink>, source_tag: &str) -> Self {
        Self {
            kernel,
            sink,
            source_tag: Arc::from(source_tag),
        }
    }

    fn job(&self, action: OutputAction) -> Job {
        let latency = self.kernel.latency_for(action.latency_class());
        Job::new(OutputTask::new(
            action,
            Arc::clone(&self.sink),
            Arc::clone(&self.source_tag),
            latency,
        ))
    }

    /// Submit a latency-budgeted action. Clock ticks should use
    /// [`tick_at`](Self::tick_at) instead.
    pub fn submit(&self, action: OutputAction) -> bool {
        let class = action.latency_class();
        self.kernel.schedule_class(self.job(action), class)
    }

    pub fn set_indicator(&self, coord: Coordinate, value: i32) -> bool {
        self.submit(OutputAction::SetIndicator { coord, value })
    }

    pub fn scroll(&self, offset: Coordinate) -> bool {
        self.submit(OutputAction::ScrollViewport { offset })
    }

    /// Emit clock tick `beat` at exactly `at` on the precision thread.
    pub fn tick_at(&self, beat: u64, at: Instant) -> bool {
        self.kernel
            .schedule_at(self.job(OutputAction::ClockTick { beat }), at)
    }
}

impl std::fmt::Debug for OutputPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputPort")
            .field("source_tag", &self.source_tag)
            .finish()
    }
}

// ── Indicator state ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndicatorCell {
    pub coord: Coordinate,
    pub value: i32,
}

/// Source tags ending in this suffix carry indicator values.
pub const INDICATOR_TAG_SUFFIX: &str = ".indicator";

/// In-memory sink that keeps the latest indicator value per coordinate
/// and counts everything else it is sent.
///
/// Only sends whose source tag ends in [`INDICATOR_TAG_SUFFIX`] update a
/// cell, so indicator ports must be tagged `<source>.indicator`. Anything
/// else, including a `SetIndicator` through a differently tagged port, is
/// counted and otherwise ignored.
#[derive(Debug, Default)]
pub struct IndicatorBoard {
    cells: Mutex<BTreeMap<Coordinate, i32>>,
    sends: Mutex<u64>,
}

impl IndicatorBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self, coord: Coordinate) -> Option<i32> {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&coord)
            .copied()
    }

    pub fn sends(&self) -> u64 {
        *self.sends.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lit cells in coordinate order.
    pub fn snapshot(&self) -> Vec<IndicatorCell> {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(_, value)| **value != 0)
            .map(|(&coord, &value)| IndicatorCell { coord, value })
            .collect()
    }
}

impl OutputSink for IndicatorBoard {
    fn send(&self, coord: Coordinate, value: i32, source_tag: &str) -> Result<(), TaskError> {
        *self.sends.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        if source_tag.ends_with(INDICATOR_TAG_SUFFIX) {
            self.cells
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(coord, value);
        }
        Ok(())
    }
}

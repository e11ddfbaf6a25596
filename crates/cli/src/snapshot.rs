//! Periodic JSON snapshot of indicator state and kernel metrics.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tactus_hardware::{IndicatorBoard, IndicatorCell};
use tactus_kernel::{FnTask, Job, KernelHandle, KernelMetrics, RepeatPolicy, TaskError};

pub const SNAPSHOT_JOB: &str = "snapshot";
pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub pending: usize,
    pub indicators: Vec<IndicatorCell>,
    pub metrics: KernelMetrics,
}

impl Snapshot {
    pub fn capture(board: &IndicatorBoard, kernel: &KernelHandle) -> Self {
        Self {
            taken_at: Utc::now(),
            pending: kernel.pending(),
            indicators: board.snapshot(),
            metrics: kernel.metrics(),
        }
    }

    /// Write as pretty JSON via a temp file and rename.
    pub fn write(&self, path: &Path) -> Result<(), TaskError> {
        let json = serde_json::to_vec_pretty(self).map_err(|e| TaskError::Failed(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| TaskError::Failed(format!("{}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, path)
            .map_err(|e| TaskError::Failed(format!("{}: {e}", path.display())))
    }
}

/// Repeating job that writes a snapshot to `path` at most once per
/// `interval`. Stop it through the returned policy.
pub fn snapshot_job(
    path: PathBuf,
    board: Arc<IndicatorBoard>,
    kernel: KernelHandle,
    interval: Duration,
) -> (Job, RepeatPolicy) {
    let policy = RepeatPolicy::every(interval);
    let latency = kernel.latency_for(tactus_kernel::LatencyClass::Background);
    let task = FnTask::new(SNAPSHOT_JOB, latency, move || {
        Snapshot::capture(&board, &kernel).write(&path)
    });
    (Job::new(task).with_repeat(policy.clone()), policy)
}

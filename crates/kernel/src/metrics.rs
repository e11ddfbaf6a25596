use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Kernel metrics shared between the scheduler, workers and handles.
pub type SharedMetrics = Arc<RwLock<KernelMetrics>>;

/// Kernel operational metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KernelMetrics {
    /// Total run-step invocations by task name, failures included.
    pub tasks_executed: HashMap<String, u64>,
    /// Failed or panicked run-steps by task name.
    pub task_failures: HashMap<String, u64>,
    /// Average run-step duration by task name.
    pub avg_task_duration: HashMap<String, Duration>,
    /// Last execution time by task name.
    pub last_run: HashMap<String, DateTime<Utc>>,
    /// Jobs handed to a standard worker.
    pub dispatched: u64,
    /// Jobs fired by the precision thread.
    pub timed_fired: u64,
    /// Monitored jobs discarded because they were cancelled before dispatch.
    pub discarded_cancelled: u64,
    /// Repeating jobs put back because they were not ready when dequeued.
    pub requeued: u64,
    /// Jobs dropped because a queue was disabled or the pool had shut down.
    pub dropped: u64,
    /// Dispatches that happened after their deadline.
    pub late_dispatches: u64,
    /// Mean of `dispatch time - deadline` over all dispatches, zero when early.
    pub avg_dispatch_lateness: Duration,
    /// Worst observed dispatch lateness.
    pub max_dispatch_lateness: Duration,
    /// Busy worker ratio (0.0 - 1.0) at the time of the snapshot.
    pub worker_utilization: f64,
    /// Number of standard worker slots.
    pub worker_slots: usize,
}

impl KernelMetrics {
    pub fn shared() -> SharedMetrics {
        Arc::new(RwLock::new(Self::default()))
    }

    /// Record a task execution.
    pub fn record_execution(&mut self, task_name: &str, duration: Duration) {
        *self.tasks_executed.entry(task_name.to_string()).or_default() += 1;
        self.last_run.insert(task_name.to_string(), Utc::now());

        let count = self.tasks_executed[task_name];
        let prev_avg = self
            .avg_task_duration
            .get(task_name)
            .copied()
            .unwrap_or_default();

        self.avg_task_duration
            .insert(task_name.to_string(), incremental_mean(prev_avg, duration, count));
    }

    pub fn record_failure(&mut self, task_name: &str) {
        *self.task_failures.entry(task_name.to_string()).or_default() += 1;
    }

    /// Record a hand-off to a worker `lateness` after the job's deadline.
    pub fn record_dispatch(&mut self, lateness: Duration) {
        self.dispatched += 1;
        if !lateness.is_zero() {
            self.late_dispatches += 1;
        }
        self.max_dispatch_lateness = self.max_dispatch_lateness.max(lateness);
        self.avg_dispatch_lateness =
            incremental_mean(self.avg_dispatch_lateness, lateness, self.dispatched);
    }

    pub fn record_timed_fire(&mut self) {
        self.timed_fired += 1;
    }

    pub fn record_discarded(&mut self) {
        self.discarded_cancelled += 1;
    }

    pub fn record_requeue(&mut self) {
        self.requeued += 1;
    }

    pub fn record_dropped(&mut self) {
        self.dropped += 1;
    }

    pub fn set_utilization(&mut self, active: usize, slots: usize) {
        self.worker_slots = slots;
        self.worker_utilization = if slots == 0 {
            0.0
        } else {
            active as f64 / slots as f64
        };
    }

    /// Total failures across all task names.
    pub fn total_failures(&self) -> u64 {
        self.task_failures.values().sum()
    }

    /// Total run-step invocations across all task names.
    pub fn total_executed(&self) -> u64 {
        self.tasks_executed.values().sum()
    }
}

// Incremental mean: new_avg = prev_avg + (sample - prev_avg) / count
fn incremental_mean(prev_avg: Duration, sample: Duration, count: u64) -> Duration {
    if count <= 1 {
        return sample;
    }
    let prev_nanos = prev_avg.as_nanos() as f64;
    let cur_nanos = sample.as_nanos() as f64;
    let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / count as f64;
    Duration::from_nanos(avg_nanos.max(0.0) as u64)
}

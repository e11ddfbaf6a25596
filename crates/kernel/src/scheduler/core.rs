use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::metrics::{KernelMetrics, SharedMetrics};
use crate::pool::WorkerPool;
use crate::queue::DeadlineQueue;
use crate::sync::read;

/// The kernel's single selector. Pulls the earliest-deadline ready job off
/// the [`DeadlineQueue`] and hands it to the [`WorkerPool`], blocking when
/// the pool is saturated.
pub struct Scheduler {
    pub(super) queue: Arc<DeadlineQueue>,
    pub(super) pool: Arc<WorkerPool>,
    pub(super) metrics: SharedMetrics,
    /// Cleared by [`Scheduler::stop`].
    pub(super) running: AtomicBool,
    /// Back-off while the queue is disabled but the loop is still running.
    pub(super) idle_poll: Duration,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("queue", &self.queue)
            .field("pool", &self.pool)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Scheduler {
    pub fn new(
        queue: Arc<DeadlineQueue>,
        pool: Arc<WorkerPool>,
        metrics: SharedMetrics,
        idle_poll: Duration,
    ) -> Self {
        Self {
            queue,
            pool,
            metrics,
            running: AtomicBool::new(true),
            idle_poll,
        }
    }

    /// Signal the loop to stop. It exits after the current step, or within
    /// one idle poll when it is waiting for work.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("scheduler stop requested");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn queue(&self) -> &Arc<DeadlineQueue> {
        &self.queue
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    /// Snapshot of the current metrics, with worker utilization filled in.
    pub fn metrics(&self) -> KernelMetrics {
        let mut snapshot = read(&self.metrics).clone();
        snapshot.set_utilization(self.pool.active(), self.pool.capacity());
        snapshot.dropped += self.queue.dropped() + self.pool.timed_queue().dropped();
        snapshot
    }
}

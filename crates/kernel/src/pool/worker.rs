use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, trace, warn};

use crate::error::TaskError;
use crate::metrics::SharedMetrics;
use crate::sync::write;
use crate::task::{Claim, Job};
use crate::timed::TimedQueue;

use super::PoolShared;

/// Standard worker: wait for an assignment, run it, free the slot, repeat.
pub(super) fn worker_loop(shared: Arc<PoolShared>, slot: usize) {
    debug!(slot, "worker started");
    let mailbox = &shared.mailboxes[slot];
    while let Some(job) = mailbox.next(&shared.running, shared.poll) {
        execute(&shared.metrics, job);
        shared.release(slot);
    }
    debug!(slot, "worker stopped");
}

/// Precision thread: run each timed entry as its fire instant arrives.
pub(super) fn precision_loop(timed: Arc<TimedQueue>, metrics: SharedMetrics) {
    debug!("precision thread started");
    while let Some((fire_at, job)) = timed.next_due() {
        if let Some(monitor) = job.monitor() {
            match monitor.claim() {
                Claim::Cancelled => {
                    debug!(task = %job.name(), "timed job cancelled, discarding");
                    write(&metrics).record_discarded();
                    continue;
                }
                Claim::Claimed => monitor.fire_processed(),
                Claim::AlreadyProcessed => {}
            }
        }
        let late = Instant::now().saturating_duration_since(fire_at);
        trace!(task = %job.name(), ?late, "timed job firing");
        write(&metrics).record_timed_fire();
        execute(&metrics, job);
    }
    debug!("precision thread stopped");
}

/// Run one job's step. Failures and panics are logged and counted; they
/// never escape the calling thread.
fn execute(metrics: &SharedMetrics, job: Job) {
    let name = job.name().to_string();
    let id = job.id();
    let started = Instant::now();
    let result = job.run_step();
    let elapsed = started.elapsed();

    let mut m = write(metrics);
    m.record_execution(&name, elapsed);
    match result {
        Ok(()) => trace!(task = %name, %id, ?elapsed, "task completed"),
        Err(TaskError::Panicked(msg)) => {
            m.record_failure(&name);
            error!(task = %name, %id, panic = %msg, "task panicked");
        }
        Err(e) => {
            m.record_failure(&name);
            warn!(task = %name, %id, error = %e, "task failed");
        }
    }
}

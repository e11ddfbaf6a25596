use std::sync::atomic::Ordering;
use std::time::Instant;

use tracing::{debug, info, trace, warn};

use crate::sync::write;
use crate::task::Claim;

use super::Scheduler;

/// What a single [`Scheduler::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A job was handed to a worker.
    Dispatched,
    /// A monitored job was cancelled before dispatch and discarded unrun.
    DiscardedCancelled,
    /// A repeating job turned out not to be ready and went back unchanged.
    Requeued,
    /// The pool refused the job because it is shutting down.
    Rejected,
    /// Nothing ready.
    Idle,
}

impl Scheduler {
    /// Run one selection step: flush buffered insertions, take the most
    /// urgent ready job and dispatch it, blocking while the pool is full.
    pub fn step(&self) -> StepOutcome {
        self.queue.flush_insertions();
        let Some((deadline, job)) = self.queue.dequeue_with_deadline() else {
            return StepOutcome::Idle;
        };

        if job.is_cancelled() {
            debug!(task = %job.name(), id = %job.id(), "discarding cancelled job");
            write(&self.metrics).record_discarded();
            return StepOutcome::DiscardedCancelled;
        }

        // Readiness can flip between dequeue and here (e.g. a gate).
        if !job.is_ready(Instant::now()) {
            debug!(task = %job.name(), "repeating job not ready, requeueing");
            write(&self.metrics).record_requeue();
            self.queue.enqueue_at(job, deadline);
            return StepOutcome::Requeued;
        }

        // Claim before hand-off so a concurrent cancel either wins outright or
        // observes Processed and is ignored.
        let monitor = job.monitor().cloned();
        let claim = monitor.as_ref().map(|m| m.claim());
        if claim == Some(Claim::Cancelled) {
            debug!(task = %job.name(), id = %job.id(), "discarding cancelled job");
            write(&self.metrics).record_discarded();
            return StepOutcome::DiscardedCancelled;
        }

        let repeat = job.repeat().cloned();
        let next_cycle = job.next_cycle();
        let name = job.name().to_string();

        let slot = match self.pool.dispatch_asap(job) {
            Ok(slot) => slot,
            Err(e) => {
                warn!(task = %name, error = %e, "dispatch rejected");
                write(&self.metrics).record_dropped();
                return StepOutcome::Rejected;
            }
        };
        let dispatched_at = Instant::now();
        let lateness = dispatched_at.saturating_duration_since(deadline);
        trace!(task = %name, slot, ?lateness, "dispatched");
        write(&self.metrics).record_dispatch(lateness);

        if let Some(repeat) = repeat {
            repeat.mark_ran(dispatched_at);
            if let Some(next) = next_cycle {
                self.queue.enqueue(next, None);
            }
        }

        if claim == Some(Claim::Claimed) {
            if let Some(monitor) = monitor {
                monitor.fire_processed();
            }
        }
        StepOutcome::Dispatched
    }

    /// Run the main scheduling loop. Blocks until [`stop`](Self::stop).
    pub fn run(&self) {
        info!(
            workers = self.pool.capacity(),
            pending = self.queue.len(),
            "scheduler starting"
        );

        while self.running.load(Ordering::SeqCst) {
            match self.step() {
                StepOutcome::Idle if self.queue.is_enabled() => self.queue.block_for_work(),
                StepOutcome::Idle => std::thread::sleep(self.idle_poll),
                _ => {}
            }
        }

        info!("scheduler stopped");
    }
}

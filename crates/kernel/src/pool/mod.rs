//! Worker pool: N anonymous standard workers plus one precision thread.
//!
//! Three separate signals keep unrelated waiters apart:
//! - the slot table mutex guards assignment,
//! - each worker's mailbox condvar carries "new work" to exactly that worker,
//! - the `slot_freed` condvar wakes a dispatcher blocked on a full pool.

mod mailbox;
mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use tracing::{debug, info, trace};

use crate::error::KernelError;
use crate::metrics::SharedMetrics;
use crate::sync::{lock, wait_timeout};
use crate::task::Job;
use crate::threads::ThreadRegistry;
use crate::timed::TimedQueue;

use self::mailbox::Mailbox;

/// Name prefix of standard worker threads; the slot index is appended.
pub const WORKER_THREAD_PREFIX: &str = "tactus-worker-";
pub const PRECISION_THREAD_NAME: &str = "tactus-precision";

/// Pool sizing and wait bounds.
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    pub workers: usize,
    /// Re-check bound while blocked on "slot freed".
    pub slot_wait: Duration,
    /// How often an idle worker re-checks the running flag.
    pub poll: Duration,
}

pub(crate) struct PoolShared {
    /// `true` = slot busy.
    slots: Mutex<Vec<bool>>,
    slot_freed: Condvar,
    mailboxes: Vec<Mailbox>,
    running: AtomicBool,
    slot_wait: Duration,
    poll: Duration,
    metrics: SharedMetrics,
}

impl PoolShared {
    fn release(&self, slot: usize) {
        lock(&self.slots)[slot] = false;
        self.slot_freed.notify_all();
    }
}

pub struct WorkerPool {
    shared: Arc<PoolShared>,
    timed: Arc<TimedQueue>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("capacity", &self.capacity())
            .field("active", &self.active())
            .field("running", &self.is_running())
            .finish()
    }
}

impl WorkerPool {
    /// Spawn `options.workers` standard workers and the precision thread
    /// servicing `timed`, registering every thread with `threads`.
    pub fn start(
        options: PoolOptions,
        timed: Arc<TimedQueue>,
        metrics: SharedMetrics,
        threads: &ThreadRegistry,
    ) -> Result<Self, KernelError> {
        let workers = options.workers.max(1);
        let shared = Arc::new(PoolShared {
            slots: Mutex::new(vec![false; workers]),
            slot_freed: Condvar::new(),
            mailboxes: (0..workers).map(|_| Mailbox::new()).collect(),
            running: AtomicBool::new(true),
            slot_wait: options.slot_wait,
            poll: options.poll,
            metrics: Arc::clone(&metrics),
        });
        let pool = Self { shared, timed };

        for slot in 0..workers {
            let shared = Arc::clone(&pool.shared);
            if let Err(e) = threads.spawn(format!("{WORKER_THREAD_PREFIX}{slot}"), move || {
                worker::worker_loop(shared, slot)
            }) {
                pool.shutdown();
                return Err(e);
            }
        }

        let timed = Arc::clone(&pool.timed);
        if let Err(e) =
            threads.spawn(PRECISION_THREAD_NAME, move || worker::precision_loop(timed, metrics))
        {
            pool.shutdown();
            return Err(e);
        }

        info!(workers, slot_wait = ?options.slot_wait, "worker pool started");
        Ok(pool)
    }

    /// Assign `job` to an idle worker slot, blocking while every slot is busy.
    ///
    /// The wait re-checks every `slot_wait` in case a wake-up was missed.
    /// Returns the slot index, or [`KernelError::PoolShutDown`] (the job is
    /// dropped) once the pool has stopped.
    pub fn dispatch_asap(&self, job: Job) -> Result<usize, KernelError> {
        let mut slots = lock(&self.shared.slots);
        loop {
            if !self.is_running() {
                debug!(task = %job.name(), "pool shut down, dropping job");
                return Err(KernelError::PoolShutDown);
            }
            if let Some(slot) = slots.iter().position(|busy| !busy) {
                slots[slot] = true;
                drop(slots);
                return match self.shared.mailboxes[slot].deliver(job) {
                    Ok(()) => Ok(slot),
                    Err(job) => {
                        debug!(task = %job.name(), slot, "worker exited, dropping job");
                        self.shared.release(slot);
                        Err(KernelError::PoolShutDown)
                    }
                };
            }
            trace!(task = %job.name(), "all worker slots busy, waiting");
            slots = wait_timeout(&self.shared.slot_freed, slots, self.shared.slot_wait);
        }
    }

    /// Submit to the precision thread's time-keyed queue.
    pub fn schedule_timed(&self, job: Job, fire_at: std::time::Instant) -> bool {
        self.timed.schedule_at(job, fire_at)
    }

    pub fn timed_queue(&self) -> &Arc<TimedQueue> {
        &self.timed
    }

    /// Number of standard worker slots.
    pub fn capacity(&self) -> usize {
        self.shared.mailboxes.len()
    }

    /// Slots currently holding a job.
    pub fn active(&self) -> usize {
        lock(&self.shared.slots).iter().filter(|busy| **busy).count()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Stop accepting dispatches and wake every pool thread. Jobs already
    /// handed to a worker still run; threads exit on their own and are
    /// joined through the thread registry.
    pub fn shutdown(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!(active = self.active(), "worker pool shutting down");
        self.timed.set_enabled(false);
        for mailbox in &self.shared.mailboxes {
            mailbox.wake();
        }
        let _slots = lock(&self.shared.slots);
        self.shared.slot_freed.notify_all();
    }
}

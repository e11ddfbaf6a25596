//! Scheduling context: owns every kernel thread and hands out handles.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use tactus_core::{KernelConfig, LatencyClass};

use crate::error::KernelError;
use crate::metrics::KernelMetrics;
use crate::pool::{PoolOptions, WorkerPool};
use crate::queue::DeadlineQueue;
use crate::scheduler::{Scheduler, SCHEDULER_THREAD_NAME};
use crate::task::Job;
use crate::threads::ThreadRegistry;
use crate::timed::TimedQueue;

/// Summary returned by [`Kernel::shutdown`].
#[derive(Debug, Clone, Serialize)]
pub struct ShutdownReport {
    /// Deadline-queue entries that never ran.
    pub pending_dropped: usize,
    /// Timed entries that never fired.
    pub timed_dropped: usize,
    pub threads_joined: usize,
    pub threads_panicked: usize,
    pub uptime: Duration,
    pub metrics: KernelMetrics,
}

struct Shared {
    config: KernelConfig,
    scheduler: Arc<Scheduler>,
}

/// Cheap, cloneable entry point for producers.
#[derive(Clone)]
pub struct KernelHandle {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for KernelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelHandle")
            .field("running", &self.is_running())
            .field("pending", &self.pending())
            .finish()
    }
}

impl KernelHandle {
    /// Submit `job` with its own latency budget. Returns `false` when the job
    /// was not queued (kernel shutting down, or repeating job already queued
    /// or stopped).
    pub fn schedule(&self, job: Job) -> bool {
        self.queue().enqueue(job, None)
    }

    /// Submit `job` with an explicit latency budget.
    pub fn schedule_with_latency(&self, job: Job, latency: Duration) -> bool {
        self.queue().enqueue(job, Some(latency))
    }

    /// Submit `job` with the configured budget of `class`.
    pub fn schedule_class(&self, job: Job, class: LatencyClass) -> bool {
        self.schedule_with_latency(job, self.latency_for(class))
    }

    /// Run `job` on the precision thread at exactly `fire_at`.
    pub fn schedule_at(&self, job: Job, fire_at: Instant) -> bool {
        self.shared.scheduler.pool().schedule_timed(job, fire_at)
    }

    /// Shift every pending timed entry, e.g. after a tempo change.
    pub fn retime<F>(&self, f: F) -> usize
    where
        F: FnMut(Instant) -> Instant,
    {
        self.shared.scheduler.pool().timed_queue().retime(f)
    }

    /// Configured latency budget for `class`.
    pub fn latency_for(&self, class: LatencyClass) -> Duration {
        self.shared.config.latency.budget_for(class)
    }

    /// Configured minimum interval for the repeating job `name`.
    pub fn repeat_interval(&self, name: &str) -> Option<Duration> {
        self.shared.config.repeat_interval(name)
    }

    pub fn config(&self) -> &KernelConfig {
        &self.shared.config
    }

    pub fn metrics(&self) -> KernelMetrics {
        self.shared.scheduler.metrics()
    }

    /// Entries waiting in the deadline queue.
    pub fn pending(&self) -> usize {
        self.queue().len()
    }

    pub fn is_running(&self) -> bool {
        self.shared.scheduler.is_running()
    }

    fn queue(&self) -> &DeadlineQueue {
        self.shared.scheduler.queue()
    }
}

/// The running kernel: N workers, one precision thread and the scheduler
/// thread. Shut down explicitly with [`Kernel::shutdown`]; dropping a
/// running kernel performs the same teardown.
pub struct Kernel {
    handle: KernelHandle,
    threads: ThreadRegistry,
    started_at: Instant,
    stopped: bool,
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("threads", &self.threads)
            .field("stopped", &self.stopped)
            .finish()
    }
}

impl Kernel {
    /// Validate `config` and spawn the kernel's threads.
    pub fn start(config: KernelConfig) -> Result<Self, KernelError> {
        config.validate()?;

        let workers = config.resolved_worker_threads();
        let metrics = KernelMetrics::shared();
        let threads = ThreadRegistry::new();

        let queue = Arc::new(DeadlineQueue::new(config.spin_threshold(), config.idle_poll()));
        let timed = Arc::new(TimedQueue::new(config.spin_threshold(), config.worker_poll()));
        let options = PoolOptions {
            workers,
            slot_wait: config.slot_wait(),
            poll: config.worker_poll(),
        };
        let pool = match WorkerPool::start(options, timed, Arc::clone(&metrics), &threads) {
            Ok(pool) => Arc::new(pool),
            Err(e) => {
                threads.join_all();
                return Err(e);
            }
        };

        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&queue),
            Arc::clone(&pool),
            metrics,
            config.idle_poll(),
        ));
        let runner = Arc::clone(&scheduler);
        if let Err(e) = threads.spawn(SCHEDULER_THREAD_NAME, move || runner.run()) {
            queue.set_enabled(false);
            pool.shutdown();
            threads.join_all();
            return Err(e);
        }

        info!(
            workers,
            threads = threads.len(),
            spin_threshold = ?config.spin_threshold(),
            "kernel started"
        );

        Ok(Self {
            handle: KernelHandle {
                shared: Arc::new(Shared { config, scheduler }),
            },
            threads,
            started_at: Instant::now(),
            stopped: false,
        })
    }

    pub fn handle(&self) -> KernelHandle {
        self.handle.clone()
    }

    pub fn metrics(&self) -> KernelMetrics {
        self.handle.metrics()
    }

    /// Stop the scheduler, disable both queues, wake every thread and join
    /// them. Jobs already on a worker finish; queued jobs are dropped.
    pub fn shutdown(mut self) -> ShutdownReport {
        self.teardown()
    }

    fn teardown(&mut self) -> ShutdownReport {
        self.stopped = true;
        let scheduler = &self.handle.shared.scheduler;
        let queue = scheduler.queue();
        let timed = scheduler.pool().timed_queue();
        info!(pending = queue.len(), timed = timed.len(), "kernel shutting down");

        scheduler.stop();
        queue.set_enabled(false);
        scheduler.pool().shutdown();

        let threads_joined = self.threads.len();
        let threads_panicked = self.threads.join_all();
        if threads_panicked > 0 {
            warn!(threads_panicked, "kernel threads panicked during shutdown");
        }

        let report = ShutdownReport {
            pending_dropped: queue.clear(),
            timed_dropped: timed.clear(),
            threads_joined,
            threads_panicked,
            uptime: self.started_at.elapsed(),
            metrics: scheduler.metrics(),
        };
        info!(
            pending_dropped = report.pending_dropped,
            timed_dropped = report.timed_dropped,
            executed = report.metrics.total_executed(),
            uptime = ?report.uptime,
            "kernel stopped"
        );
        report
    }
}

impl Drop for Kernel {
    fn drop(&mut self) {
        if !self.stopped {
            self.teardown();
        }
    }
}

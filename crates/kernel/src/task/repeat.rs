use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::sync::lock;

type Gate = Box<dyn Fn() -> bool + Send + Sync + 'static>;

struct Inner {
    min_interval: Duration,
    last_run: Mutex<Option<Instant>>,
    /// Extra readiness condition ANDed with the interval rule.
    gate: Option<Gate>,
    /// Set while an entry for this job sits in the deadline queue.
    queued: AtomicBool,
    stopped: AtomicBool,
    runs: AtomicU64,
}

/// Repeat capability: minimum interval, last-run timestamp and readiness.
///
/// The policy is shared between the producer (who may stop it or inspect
/// it) and every queue entry of the job, so it survives across runs.
#[derive(Clone)]
pub struct RepeatPolicy {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RepeatPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepeatPolicy")
            .field("min_interval", &self.inner.min_interval)
            .field("last_run", &self.last_run())
            .field("gated", &self.inner.gate.is_some())
            .field("queued", &self.is_queued())
            .field("stopped", &self.is_stopped())
            .field("runs", &self.run_count())
            .finish()
    }
}

impl RepeatPolicy {
    /// Run at most once per `min_interval`.
    pub fn every(min_interval: Duration) -> Self {
        Self::build(min_interval, None)
    }

    /// Like [`every`](Self::every), but additionally require `gate()` to
    /// return true (e.g. "there are unsaved changes").
    pub fn gated<G>(min_interval: Duration, gate: G) -> Self
    where
        G: Fn() -> bool + Send + Sync + 'static,
    {
        Self::build(min_interval, Some(Box::new(gate)))
    }

    fn build(min_interval: Duration, gate: Option<Gate>) -> Self {
        Self {
            inner: Arc::new(Inner {
                min_interval,
                last_run: Mutex::new(None),
                gate,
                queued: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
                runs: AtomicU64::new(0),
            }),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.inner.min_interval
    }

    pub fn last_run(&self) -> Option<Instant> {
        *lock(&self.inner.last_run)
    }

    pub fn run_count(&self) -> u64 {
        self.inner.runs.load(Ordering::SeqCst)
    }

    /// Whether the job may run at `now`: never run, or more than the
    /// minimum interval has elapsed since the last run, and the gate agrees.
    pub fn is_ready(&self, now: Instant) -> bool {
        if self.is_stopped() {
            return false;
        }
        let interval_ok = match self.last_run() {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.inner.min_interval,
        };
        interval_ok && self.inner.gate.as_ref().map_or(true, |gate| gate())
    }

    /// The instant the interval rule next flips to ready, if that is still
    /// ahead of `now`. `None` means either already past (only the gate can
    /// hold the job back) or never run.
    pub fn ready_at(&self, now: Instant) -> Option<Instant> {
        let last = self.last_run()?;
        let at = last.checked_add(self.inner.min_interval)?;
        (at >= now).then_some(at)
    }

    /// Record a run at `at`.
    pub fn mark_ran(&self, at: Instant) {
        *lock(&self.inner.last_run) = Some(at);
        self.inner.runs.fetch_add(1, Ordering::SeqCst);
    }

    /// Stop repeating. A pending queue entry is discarded at its next dequeue.
    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    pub fn is_queued(&self) -> bool {
        self.inner.queued.load(Ordering::SeqCst)
    }

    /// Claim the single queue position. `false` means an entry is already queued.
    pub(crate) fn claim_queue_slot(&self) -> bool {
        self.inner
            .queued
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn release_queue_slot(&self) {
        self.inner.queued.store(false, Ordering::SeqCst);
    }

    pub(crate) fn same_policy(&self, other: &RepeatPolicy) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

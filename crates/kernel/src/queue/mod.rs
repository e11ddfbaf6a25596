//! Deadline queue: pending jobs ordered by absolute deadline.
//!
//! Insertion and consumption use separate locks. Producers append to an
//! inbox and signal; the consumer merges the inbox into the ordered live set
//! with [`DeadlineQueue::flush_insertions`] before dequeuing, so a burst of
//! producers never contends with the dequeue scan.
//!
//! Repeating jobs whose readiness predicate is false stay in place and are
//! skipped by [`DeadlineQueue::dequeue`]. [`DeadlineQueue::block_for_work`]
//! sleeps until new data arrives or the earliest such job becomes ready.

mod entry;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use crate::sync::{lock, wait_timeout};
use crate::task::Job;
use crate::waiter::PrecisionWaiter;

use self::entry::{deadline_after, Entry, EntryKey};

pub struct DeadlineQueue {
    /// Buffered insertions, merged by `flush_insertions`.
    inbox: Mutex<Vec<Entry>>,
    /// Ordered pending entries.
    live: Mutex<BTreeMap<EntryKey, Job>>,
    /// Insertion sequence; FIFO tie-break for equal deadlines.
    seq: AtomicU64,
    enabled: AtomicBool,
    /// "New data" signal: bumped on every insertion and on disable.
    data_epoch: Mutex<u64>,
    data_signal: Condvar,
    /// Times the wait for the next repeating entry to become ready.
    waiter: PrecisionWaiter,
    idle_poll: Duration,
    dropped: AtomicU64,
}

impl std::fmt::Debug for DeadlineQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeadlineQueue")
            .field("len", &self.len())
            .field("enabled", &self.is_enabled())
            .field("idle_poll", &self.idle_poll)
            .finish()
    }
}

impl DeadlineQueue {
    pub fn new(spin_threshold: Duration, idle_poll: Duration) -> Self {
        Self {
            inbox: Mutex::new(Vec::new()),
            live: Mutex::new(BTreeMap::new()),
            seq: AtomicU64::new(0),
            enabled: AtomicBool::new(true),
            data_epoch: Mutex::new(0),
            data_signal: Condvar::new(),
            waiter: PrecisionWaiter::new(spin_threshold),
            idle_poll,
            dropped: AtomicU64::new(0),
        }
    }

    // ── Producer side ─────────────────────────────────────────

    /// Submit `job` with deadline `now + (latency_override ?? expected latency)`.
    ///
    /// Returns `false` when the job was not queued: the queue is disabled
    /// (the job is dropped), the repeating job is stopped, or an entry for the
    /// same repeating job is already pending.
    pub fn enqueue(&self, job: Job, latency_override: Option<Duration>) -> bool {
        let latency = latency_override.unwrap_or_else(|| job.expected_latency());
        self.enqueue_at(job, deadline_after(Instant::now(), latency))
    }

    /// Submit `job` with an explicit absolute deadline.
    pub fn enqueue_at(&self, job: Job, deadline: Instant) -> bool {
        if !self.is_enabled() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(task = %job.name(), "queue disabled, dropping job");
            return false;
        }
        if let Some(repeat) = job.repeat() {
            if repeat.is_stopped() {
                debug!(task = %job.name(), "repeating job stopped, not queued");
                return false;
            }
            if !repeat.claim_queue_slot() {
                trace!(task = %job.name(), "repeating job already queued");
                return false;
            }
        }
        if let Some(monitor) = job.monitor() {
            monitor.mark_scheduled();
        }

        {
            // seq is taken under the inbox lock so the inbox stays in seq order.
            let mut inbox = lock(&self.inbox);
            let key = EntryKey {
                deadline,
                seq: self.seq.fetch_add(1, Ordering::Relaxed),
            };
            inbox.push(Entry { key, job });
        }
        self.signal_data();
        true
    }

    fn signal_data(&self) {
        {
            let mut epoch = lock(&self.data_epoch);
            *epoch = epoch.wrapping_add(1);
        }
        self.data_signal.notify_all();
        self.waiter.pulse_all();
    }

    // ── Consumer side ─────────────────────────────────────────

    /// Merge buffered insertions into the ordered set. Returns how many moved.
    pub fn flush_insertions(&self) -> usize {
        let buffered = std::mem::take(&mut *lock(&self.inbox));
        if buffered.is_empty() {
            return 0;
        }
        let moved = buffered.len();
        let mut live = lock(&self.live);
        for entry in buffered {
            live.insert(entry.key, entry.job);
        }
        moved
    }

    /// Remove and return the earliest-deadline ready job. Not-ready repeating
    /// jobs are skipped and stay queued; stopped ones are discarded.
    /// Non-blocking; only sees entries already flushed.
    pub fn dequeue(&self) -> Option<Job> {
        self.dequeue_entry().map(|(_, job)| job)
    }

    /// Like [`dequeue`](Self::dequeue), also returning the entry's deadline.
    pub fn dequeue_with_deadline(&self) -> Option<(Instant, Job)> {
        self.dequeue_entry().map(|(key, job)| (key.deadline, job))
    }

    fn dequeue_entry(&self) -> Option<(EntryKey, Job)> {
        if !self.is_enabled() {
            return None;
        }
        let now = Instant::now();
        let mut live = lock(&self.live);

        let mut stopped = Vec::new();
        let mut chosen = None;
        for (key, job) in live.iter() {
            if job.repeat().is_some_and(|r| r.is_stopped()) {
                stopped.push(*key);
            } else if job.is_ready(now) {
                chosen = Some(*key);
                break;
            }
        }

        for key in stopped {
            if let Some(job) = live.remove(&key) {
                debug!(task = %job.name(), "discarding stopped repeating job");
                release_slot(&job);
            }
        }

        let key = chosen?;
        let job = live.remove(&key)?;
        release_slot(&job);
        Some((key, job))
    }

    /// Whether any pending entry (flushed or buffered) satisfies `predicate`.
    /// Consumes nothing.
    pub fn any_ready<P>(&self, predicate: P) -> bool
    where
        P: Fn(&Job) -> bool,
    {
        if lock(&self.inbox).iter().any(|e| predicate(&e.job)) {
            return true;
        }
        lock(&self.live).values().any(|job| predicate(job))
    }

    /// Block until new data arrives, the earliest not-yet-ready repeating
    /// entry becomes ready, or one idle poll elapses. Returns immediately
    /// when something is already dispatchable or the queue is disabled.
    pub fn block_for_work(&self) {
        if !self.is_enabled() {
            return;
        }
        // Observe both signals before looking, so a concurrent insert wakes us.
        let epoch = *lock(&self.data_epoch);
        let pulse = self.waiter.generation();

        if !lock(&self.inbox).is_empty() {
            return;
        }

        let now = Instant::now();
        let mut next_ready: Option<Instant> = None;
        {
            let live = lock(&self.live);
            for job in live.values() {
                if job.is_ready(now) {
                    return;
                }
                if let Some(at) = job.repeat().and_then(|r| r.ready_at(now)) {
                    next_ready = Some(next_ready.map_or(at, |cur| cur.min(at)));
                }
            }
        }

        let idle_deadline = now + self.idle_poll;
        match next_ready {
            Some(at) if at <= idle_deadline => {
                trace!(wait = ?at.saturating_duration_since(now), "waiting for repeating job");
                self.waiter.wait_until_from(at, pulse);
            }
            _ => {
                let mut current = lock(&self.data_epoch);
                while *current == epoch && self.is_enabled() {
                    let remaining = idle_deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        break;
                    }
                    current = wait_timeout(&self.data_signal, current, remaining);
                }
            }
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Enable or disable the queue. Disabling drops future enqueues, makes
    /// dequeue return nothing and releases every thread in `block_for_work`.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::SeqCst);
        if was != enabled {
            info!(enabled, pending = self.len(), "deadline queue state changed");
        }
        if !enabled {
            self.signal_data();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Pending entries, buffered and flushed.
    pub fn len(&self) -> usize {
        lock(&self.inbox).len() + lock(&self.live).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueues dropped because the queue was disabled.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Drop every pending entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let buffered = std::mem::take(&mut *lock(&self.inbox));
        let flushed = std::mem::take(&mut *lock(&self.live));
        let count = buffered.len() + flushed.len();
        buffered.iter().map(|e| &e.job).chain(flushed.values()).for_each(release_slot);
        count
    }
}

fn release_slot(job: &Job) {
    if let Some(repeat) = job.repeat() {
        repeat.release_queue_slot();
    }
}

//! Time-keyed queue serviced by the precision thread.
//!
//! Entries carry an absolute fire instant and nothing else: no latency
//! budget, no readiness gate. The precision thread pops each entry once its
//! instant arrives, using the precision waiter for the final approach.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::sync::lock;
use crate::task::Job;
use crate::waiter::PrecisionWaiter;

type Key = (Instant, u64);

#[derive(Debug)]
pub struct TimedQueue {
    entries: Mutex<BTreeMap<Key, Job>>,
    seq: AtomicU64,
    enabled: AtomicBool,
    waiter: PrecisionWaiter,
    idle_poll: Duration,
    dropped: AtomicU64,
}

impl TimedQueue {
    pub fn new(spin_threshold: Duration, idle_poll: Duration) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            seq: AtomicU64::new(0),
            enabled: AtomicBool::new(true),
            waiter: PrecisionWaiter::new(spin_threshold),
            idle_poll,
            dropped: AtomicU64::new(0),
        }
    }

    /// Queue `job` to run at `fire_at`. Dropped (returns `false`) while the
    /// queue is disabled. A repeat policy on the job is not applied here:
    /// the entry fires once.
    pub fn schedule_at(&self, job: Job, fire_at: Instant) -> bool {
        if !self.is_enabled() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            debug!(task = %job.name(), "timed queue disabled, dropping job");
            return false;
        }
        if let Some(monitor) = job.monitor() {
            monitor.mark_scheduled();
        }
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        lock(&self.entries).insert((fire_at, seq), job);
        // the new entry may be earlier than the one being waited for
        self.waiter.pulse_all();
        true
    }

    /// Earliest pending fire instant.
    pub fn next_fire(&self) -> Option<Instant> {
        lock(&self.entries).keys().next().map(|(at, _)| *at)
    }

    /// Remove the earliest entry if its instant is at or before `now`.
    pub fn pop_due(&self, now: Instant) -> Option<(Instant, Job)> {
        let mut entries = lock(&self.entries);
        let (&key, _) = entries.iter().next()?;
        if key.0 > now {
            return None;
        }
        entries.remove(&key).map(|job| (key.0, job))
    }

    /// Block until the earliest entry is due and return it. Returns `None`
    /// once the queue is disabled.
    pub fn next_due(&self) -> Option<(Instant, Job)> {
        loop {
            if !self.is_enabled() {
                return None;
            }
            let observed = self.waiter.generation();
            let now = Instant::now();
            if let Some(due) = self.pop_due(now) {
                return Some(due);
            }
            let idle_deadline = now + self.idle_poll;
            match self.next_fire() {
                Some(at) if at <= idle_deadline => {
                    self.waiter.wait_until_from(at, observed);
                }
                _ => {
                    self.waiter.sleep_until_from(idle_deadline, observed);
                }
            }
        }
    }

    /// Map every pending fire instant through `f` (e.g. a tempo change) and
    /// wake the precision thread so it recomputes its wait. Relative order of
    /// entries that map to the same instant is preserved.
    pub fn retime<F>(&self, mut f: F) -> usize
    where
        F: FnMut(Instant) -> Instant,
    {
        let moved = {
            let mut entries = lock(&self.entries);
            let old = std::mem::take(&mut *entries);
            let count = old.len();
            for ((at, seq), job) in old {
                entries.insert((f(at), seq), job);
            }
            count
        };
        self.waiter.pulse_all();
        debug!(entries = moved, "timed queue retimed");
        moved
    }

    /// Disabling drops future submissions and releases the precision thread.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::SeqCst);
        if was != enabled {
            info!(enabled, pending = self.len(), "timed queue state changed");
        }
        self.waiter.pulse_all();
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Submissions dropped because the queue was disabled.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Drop every pending entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let removed = std::mem::take(&mut *lock(&self.entries));
        removed.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn timed() -> TimedQueue {
        TimedQueue::new(Duration::from_millis(2), Duration::from_millis(50))
    }

    fn job(name: &str) -> Job {
        Job::from_fn(name, Duration::from_millis(500), || {})
    }

    #[test]
    fn pops_only_due_entries_in_time_order() {
        let q = timed();
        let t = Instant::now();
        q.schedule_at(job("late"), t + Duration::from_millis(20));
        q.schedule_at(job("early"), t + Duration::from_millis(10));
        q.schedule_at(job("future"), t + Duration::from_secs(60));

        let now = t + Duration::from_millis(30);
        assert_eq!(q.pop_due(now).unwrap().1.name(), "early");
        assert_eq!(q.pop_due(now).unwrap().1.name(), "late");
        assert!(q.pop_due(now).is_none());
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn next_due_fires_on_time() {
        let q = timed();
        let at = Instant::now() + Duration::from_millis(40);
        q.schedule_at(job("tick"), at);

        let (fire_at, popped) = q.next_due().unwrap();
        let woke = Instant::now();
        assert_eq!(fire_at, at);
        assert_eq!(popped.name(), "tick");
        assert!(woke >= at);
        assert!(woke - at < Duration::from_millis(5), "late by {:?}", woke - at);
    }

    #[test]
    fn earlier_entry_interrupts_current_wait() {
        let q = Arc::new(timed());
        q.schedule_at(job("far"), Instant::now() + Duration::from_secs(30));

        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.next_due().map(|(_, j)| j.name().to_string()))
        };
        thread::sleep(Duration::from_millis(20));
        q.schedule_at(job("near"), Instant::now() + Duration::from_millis(10));

        assert_eq!(consumer.join().unwrap().as_deref(), Some("near"));
    }

    #[test]
    fn retime_shifts_fire_times() {
        let q = timed();
        let t = Instant::now() + Duration::from_secs(10);
        q.schedule_at(job("a"), t);
        q.schedule_at(job("b"), t + Duration::from_secs(1));

        assert_eq!(q.retime(|at| at + Duration::from_secs(5)), 2);
        assert_eq!(q.next_fire(), Some(t + Duration::from_secs(5)));
    }

    #[test]
    fn disabled_queue_drops_and_releases_consumer() {
        let q = Arc::new(timed());
        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.next_due().is_none())
        };
        thread::sleep(Duration::from_millis(20));
        q.set_enabled(false);

        assert!(consumer.join().unwrap());
        assert!(!q.schedule_at(job("late"), Instant::now()));
        assert!(q.is_empty());
        assert_eq!(q.dropped(), 1);
    }
}

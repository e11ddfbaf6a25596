//! Precision wall-clock waiter.
//!
//! Blocks a thread until an exact instant. While the remaining time is above
//! the spin threshold the thread sleeps in interruptible half-steps; inside
//! the threshold it spins, which is what gives sub-millisecond wake accuracy.
//! Any sleeping waiter can be released early with [`PrecisionWaiter::pulse_all`].

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::sync::{lock, wait_timeout};

/// Default remaining time below which waiting switches to spinning.
pub const DEFAULT_SPIN_THRESHOLD: Duration = Duration::from_millis(15);

/// Shortest half-step worth handing to the OS scheduler.
const MIN_SLEEP: Duration = Duration::from_millis(1);

#[derive(Debug)]
pub struct PrecisionWaiter {
    spin_threshold: Duration,
    /// Bumped by every pulse; a waiter that sees it change was woken early.
    generation: Mutex<u64>,
    pulse: Condvar,
}

impl PrecisionWaiter {
    pub fn new(spin_threshold: Duration) -> Self {
        Self {
            spin_threshold,
            generation: Mutex::new(0),
            pulse: Condvar::new(),
        }
    }

    pub fn spin_threshold(&self) -> Duration {
        self.spin_threshold
    }

    /// Current pulse generation. Pass it to [`wait_until_from`](Self::wait_until_from)
    /// to treat any pulse issued after this call as an early wake.
    pub fn generation(&self) -> u64 {
        *lock(&self.generation)
    }

    /// Block until `target`. Returns `true` when the target was reached,
    /// `false` when an external pulse ended the wait early.
    pub fn wait_until(&self, target: Instant) -> bool {
        let observed = self.generation();
        self.wait_until_from(target, observed)
    }

    /// Like [`wait_until`](Self::wait_until), but a pulse issued at any point
    /// after `observed` was read counts as an early wake, including one that
    /// landed before this call started.
    pub fn wait_until_from(&self, target: Instant, observed: u64) -> bool {
        let threshold = self.spin_threshold.max(MIN_SLEEP);
        let mut generation = lock(&self.generation);
        loop {
            if *generation != observed {
                return false;
            }
            let now = Instant::now();
            if now >= target {
                return true;
            }
            let remaining = target - now;
            if remaining <= threshold {
                break;
            }
            generation = wait_timeout(&self.pulse, generation, remaining / 2);
        }
        drop(generation);

        // Final approach: not interruptible.
        while Instant::now() < target {
            std::hint::spin_loop();
        }
        true
    }

    /// Coarse, interruptible sleep until `target` with no spin phase. Used for
    /// idle waits where wake accuracy does not matter.
    pub fn sleep_until_from(&self, target: Instant, observed: u64) -> bool {
        let mut generation = lock(&self.generation);
        loop {
            if *generation != observed {
                return false;
            }
            let now = Instant::now();
            if now >= target {
                return true;
            }
            generation = wait_timeout(&self.pulse, generation, target - now);
        }
    }

    /// Convenience for `wait_until(now + duration)`.
    pub fn wait_for(&self, duration: Duration) -> bool {
        self.wait_until(Instant::now() + duration)
    }

    /// Wake every thread currently sleeping in this waiter. Threads already
    /// in the spin phase are unaffected.
    pub fn pulse_all(&self) {
        let mut generation = lock(&self.generation);
        *generation = generation.wrapping_add(1);
        self.pulse.notify_all();
    }
}

impl Default for PrecisionWaiter {
    fn default() -> Self {
        Self::new(DEFAULT_SPIN_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn past_target_returns_immediately() {
        let waiter = PrecisionWaiter::default();
        let start = Instant::now();
        assert!(waiter.wait_until(start - Duration::from_millis(5)));
        assert!(start.elapsed() < Duration::from_millis(5));
    }

    #[test]
    fn natural_wait_is_accurate() {
        let waiter = PrecisionWaiter::default();
        let target = Instant::now() + Duration::from_millis(50);
        assert!(waiter.wait_until(target));

        let woke = Instant::now();
        assert!(woke >= target);
        assert!(woke - target < Duration::from_millis(2), "overshoot {:?}", woke - target);
    }

    #[test]
    fn short_wait_spins_only() {
        let waiter = PrecisionWaiter::default();
        let target = Instant::now() + Duration::from_millis(3);
        assert!(waiter.wait_until(target));
        assert!(Instant::now() >= target);
    }

    #[test]
    fn pulse_wakes_sleeper_early() {
        let waiter = Arc::new(PrecisionWaiter::default());
        let w = Arc::clone(&waiter);
        let start = Instant::now();
        let handle = thread::spawn(move || w.wait_until(Instant::now() + Duration::from_secs(5)));

        thread::sleep(Duration::from_millis(50));
        waiter.pulse_all();

        let natural = handle.join().unwrap();
        assert!(!natural);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn pulse_before_wait_counts_when_generation_observed_first() {
        let waiter = PrecisionWaiter::default();
        let observed = waiter.generation();
        waiter.pulse_all();

        let start = Instant::now();
        assert!(!waiter.wait_until_from(start + Duration::from_secs(5), observed));
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[test]
    fn coarse_sleep_is_interruptible() {
        let waiter = Arc::new(PrecisionWaiter::default());
        let w = Arc::clone(&waiter);
        let observed = waiter.generation();
        let handle =
            thread::spawn(move || w.sleep_until_from(Instant::now() + Duration::from_secs(5), observed));

        thread::sleep(Duration::from_millis(20));
        waiter.pulse_all();
        assert!(!handle.join().unwrap());

        let observed = waiter.generation();
        assert!(waiter.sleep_until_from(Instant::now() + Duration::from_millis(5), observed));
    }

    #[test]
    fn pulse_with_no_waiters_is_harmless() {
        let waiter = PrecisionWaiter::new(Duration::from_millis(2));
        waiter.pulse_all();
        assert!(waiter.wait_for(Duration::from_millis(10)));
    }
}

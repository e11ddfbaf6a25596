use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::sync::{lock, wait_timeout};
use crate::task::Job;

struct Inbox {
    job: Option<Job>,
    /// Set by the worker on exit; later deliveries are refused.
    closed: bool,
}

/// Single-job hand-off to one worker. Each worker waits on its own condvar,
/// so a delivery wakes exactly that worker.
pub(crate) struct Mailbox {
    inbox: Mutex<Inbox>,
    work: Condvar,
}

impl Mailbox {
    pub fn new() -> Self {
        Self {
            inbox: Mutex::new(Inbox { job: None, closed: false }),
            work: Condvar::new(),
        }
    }

    /// Hand `job` to the worker. Gives the job back if the worker has exited.
    pub fn deliver(&self, job: Job) -> Result<(), Job> {
        let mut inbox = lock(&self.inbox);
        if inbox.closed {
            return Err(job);
        }
        debug_assert!(inbox.job.is_none(), "slot assigned twice");
        inbox.job = Some(job);
        drop(inbox);
        self.work.notify_one();
        Ok(())
    }

    /// Wait for the next delivery. Returns `None`, and closes the mailbox,
    /// once `running` is cleared and nothing is pending.
    pub fn next(&self, running: &AtomicBool, poll: Duration) -> Option<Job> {
        let mut inbox = lock(&self.inbox);
        loop {
            if let Some(job) = inbox.job.take() {
                return Some(job);
            }
            if !running.load(Ordering::SeqCst) {
                inbox.closed = true;
                return None;
            }
            inbox = wait_timeout(&self.work, inbox, poll);
        }
    }

    /// Wake the worker so it re-checks the running flag.
    pub fn wake(&self) {
        let _inbox = lock(&self.inbox);
        self.work.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    use super::*;

    fn job() -> Job {
        Job::from_fn("mail", Duration::ZERO, || {})
    }

    #[test]
    fn delivery_is_received() {
        let mailbox = Mailbox::new();
        let running = AtomicBool::new(true);
        mailbox.deliver(job()).unwrap();
        assert_eq!(mailbox.next(&running, Duration::from_millis(10)).unwrap().name(), "mail");
    }

    #[test]
    fn pending_job_drains_after_stop() {
        let mailbox = Mailbox::new();
        let running = AtomicBool::new(false);
        mailbox.deliver(job()).unwrap();

        assert!(mailbox.next(&running, Duration::from_millis(10)).is_some());
        assert!(mailbox.next(&running, Duration::from_millis(10)).is_none());
        assert!(mailbox.deliver(job()).is_err());
    }

    #[test]
    fn wake_releases_waiting_worker_on_stop() {
        let mailbox = Arc::new(Mailbox::new());
        let running = Arc::new(AtomicBool::new(true));
        let worker = {
            let mailbox = Arc::clone(&mailbox);
            let running = Arc::clone(&running);
            thread::spawn(move || {
                let start = Instant::now();
                let got = mailbox.next(&running, Duration::from_secs(10));
                (got.is_none(), start.elapsed())
            })
        };

        thread::sleep(Duration::from_millis(20));
        running.store(false, Ordering::SeqCst);
        mailbox.wake();

        let (stopped, waited) = worker.join().unwrap();
        assert!(stopped);
        assert!(waited < Duration::from_secs(5));
    }
}

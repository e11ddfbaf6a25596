use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::metrics::KernelMetrics;
use crate::pool::{PoolOptions, WorkerPool};
use crate::queue::DeadlineQueue;
use crate::scheduler::{Scheduler, StepOutcome};
use crate::task::{Job, MonitorState, RepeatPolicy};
use crate::threads::ThreadRegistry;
use crate::timed::TimedQueue;

struct Rig {
    scheduler: Scheduler,
    threads: ThreadRegistry,
}

impl Rig {
    fn new(workers: usize) -> Self {
        let threads = ThreadRegistry::new();
        let metrics = KernelMetrics::shared();
        let queue = Arc::new(DeadlineQueue::new(Duration::from_millis(2), Duration::from_millis(20)));
        let timed = Arc::new(TimedQueue::new(Duration::from_millis(2), Duration::from_millis(20)));
        let options = PoolOptions {
            workers,
            slot_wait: Duration::from_millis(50),
            poll: Duration::from_millis(20),
        };
        let pool = WorkerPool::start(options, timed, Arc::clone(&metrics), &threads).unwrap();
        let scheduler = Scheduler::new(queue, Arc::new(pool), metrics, Duration::from_millis(20));
        Self { scheduler, threads }
    }

    fn queue(&self) -> &DeadlineQueue {
        self.scheduler.queue()
    }

    fn stop(self) {
        self.scheduler.stop();
        self.scheduler.queue().set_enabled(false);
        self.scheduler.pool().shutdown();
        self.threads.join_all();
    }
}

fn counting_job(name: &str, counter: &Arc<AtomicUsize>) -> Job {
    let counter = Arc::clone(counter);
    Job::from_fn(name, Duration::ZERO, move || {
        counter.fetch_add(1, Ordering::SeqCst);
    })
}

fn settle() {
    thread::sleep(Duration::from_millis(50));
}

#[test]
fn empty_queue_is_idle() {
    let rig = Rig::new(1);
    assert_eq!(rig.scheduler.step(), StepOutcome::Idle);
    rig.stop();
}

#[test]
fn step_dispatches_plain_job() {
    let rig = Rig::new(1);
    let ran = Arc::new(AtomicUsize::new(0));
    rig.queue().enqueue(counting_job("plain", &ran), None);

    assert_eq!(rig.scheduler.step(), StepOutcome::Dispatched);
    settle();
    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert_eq!(rig.scheduler.metrics().dispatched, 1);
    rig.stop();
}

#[test]
fn cancelled_job_never_runs() {
    let rig = Rig::new(1);
    let ran = Arc::new(AtomicUsize::new(0));
    let (job, monitor) = counting_job("cancelled", &ran).monitored();
    let notified = Arc::new(AtomicBool::new(false));
    let n = Arc::clone(&notified);
    monitor.on_processed(move || n.store(true, Ordering::SeqCst));

    rig.queue().enqueue(job, None);
    assert!(monitor.cancel());
    assert_eq!(rig.scheduler.step(), StepOutcome::DiscardedCancelled);

    settle();
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert!(!notified.load(Ordering::SeqCst));
    assert_eq!(monitor.state(), MonitorState::Cancelled);
    assert_eq!(rig.scheduler.metrics().discarded_cancelled, 1);
    rig.stop();
}

#[test]
fn monitored_job_is_processed_and_notifies_once() {
    let rig = Rig::new(1);
    let ran = Arc::new(AtomicUsize::new(0));
    let (job, monitor) = counting_job("watched", &ran).monitored();
    let notified = Arc::new(AtomicUsize::new(0));
    let n = Arc::clone(&notified);
    monitor.on_processed(move || {
        n.fetch_add(1, Ordering::SeqCst);
    });

    rig.queue().enqueue(job, None);
    assert_eq!(rig.scheduler.step(), StepOutcome::Dispatched);
    assert_eq!(monitor.state(), MonitorState::Processed);
    assert!(!monitor.cancel());
    assert_eq!(monitor.state(), MonitorState::Processed);

    let late = Arc::new(AtomicBool::new(false));
    let l = Arc::clone(&late);
    monitor.on_processed(move || l.store(true, Ordering::SeqCst));

    settle();
    assert_eq!(ran.load(Ordering::SeqCst), 1);
    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert!(late.load(Ordering::SeqCst));
    rig.stop();
}

#[test]
fn repeating_job_requeues_itself() {
    let rig = Rig::new(1);
    let ran = Arc::new(AtomicUsize::new(0));
    let policy = RepeatPolicy::every(Duration::from_secs(60));
    rig.queue().enqueue(counting_job("periodic", &ran).with_repeat(policy.clone()), None);

    assert_eq!(rig.scheduler.step(), StepOutcome::Dispatched);
    assert!(policy.last_run().is_some());
    assert!(policy.is_queued());
    assert_eq!(rig.queue().len(), 1);

    // next cycle is not ready for a minute
    assert_eq!(rig.scheduler.step(), StepOutcome::Idle);
    settle();
    assert_eq!(ran.load(Ordering::SeqCst), 1);
    rig.stop();
}

#[test]
fn stopped_repeating_job_is_not_resubmitted() {
    let rig = Rig::new(1);
    let ran = Arc::new(AtomicUsize::new(0));
    let policy = RepeatPolicy::every(Duration::from_millis(1));
    rig.queue().enqueue(counting_job("stop-me", &ran).with_repeat(policy.clone()), None);

    assert_eq!(rig.scheduler.step(), StepOutcome::Dispatched);
    policy.stop();
    thread::sleep(Duration::from_millis(5));
    assert_eq!(rig.scheduler.step(), StepOutcome::Idle);
    assert!(rig.queue().is_empty());
    rig.stop();
}

#[test]
fn gate_flip_after_dequeue_requeues() {
    let rig = Rig::new(1);
    let open = Arc::new(AtomicBool::new(true));
    let probes = Arc::new(AtomicUsize::new(0));
    let (o, p) = (Arc::clone(&open), Arc::clone(&probes));
    // open for the dequeue scan, closed for the scheduler's re-check
    let policy = RepeatPolicy::gated(Duration::from_millis(1), move || {
        let first = p.fetch_add(1, Ordering::SeqCst) == 0;
        first && o.load(Ordering::SeqCst)
    });
    let ran = Arc::new(AtomicUsize::new(0));
    rig.queue().enqueue(counting_job("gated", &ran).with_repeat(policy.clone()), None);

    assert_eq!(rig.scheduler.step(), StepOutcome::Requeued);
    assert!(policy.is_queued());
    assert_eq!(rig.scheduler.metrics().requeued, 1);
    settle();
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    rig.stop();
}

#[test]
fn dispatch_follows_deadline_order() {
    let rig = Rig::new(1);
    let order = Arc::new(Mutex::new(Vec::new()));
    for (name, latency) in [("c", 300), ("a", 10), ("b", 100)] {
        let order = Arc::clone(&order);
        rig.queue().enqueue(
            Job::from_fn(name, Duration::from_millis(latency), move || {
                order.lock().unwrap().push(name);
            }),
            None,
        );
    }

    for _ in 0..3 {
        assert_eq!(rig.scheduler.step(), StepOutcome::Dispatched);
    }
    settle();
    assert_eq!(*order.lock().unwrap(), ["a", "b", "c"]);
    rig.stop();
}

#[test]
fn run_loop_drains_queue_and_stops() {
    let rig = Rig::new(2);
    let ran = Arc::new(AtomicUsize::new(0));
    let scheduler = Arc::new(rig.scheduler);
    let runner = {
        let scheduler = Arc::clone(&scheduler);
        thread::spawn(move || scheduler.run())
    };

    for i in 0..20 {
        scheduler
            .queue()
            .enqueue(counting_job(&format!("job-{i}"), &ran), Some(Duration::from_millis(i)));
    }

    let give_up = Instant::now() + Duration::from_secs(5);
    while ran.load(Ordering::SeqCst) < 20 && Instant::now() < give_up {
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(ran.load(Ordering::SeqCst), 20);

    scheduler.stop();
    scheduler.queue().set_enabled(false);
    runner.join().unwrap();
    scheduler.pool().shutdown();
    rig.threads.join_all();
}

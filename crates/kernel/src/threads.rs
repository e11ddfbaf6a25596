//! Registry of the kernel's long-lived threads.
//!
//! Every thread the kernel owns (scheduler, workers, precision thread) is
//! spawned through a [`ThreadRegistry`] so teardown can join all of them in
//! one place.

use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use crate::error::KernelError;
use crate::sync::lock;

struct Registered {
    name: String,
    handle: JoinHandle<()>,
}

/// Tracks named kernel threads for coordinated shutdown.
#[derive(Default)]
pub struct ThreadRegistry {
    threads: Mutex<Vec<Registered>>,
}

impl std::fmt::Debug for ThreadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadRegistry")
            .field("threads", &self.names())
            .finish()
    }
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a named thread and register it.
    pub fn spawn<F>(&self, name: impl Into<String>, body: F) -> Result<(), KernelError>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = name.into();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(body)
            .map_err(|source| KernelError::Spawn {
                name: name.clone(),
                source,
            })?;
        debug!(thread = %name, "spawned kernel thread");
        lock(&self.threads).push(Registered { name, handle });
        Ok(())
    }

    /// Number of registered (not yet joined) threads.
    pub fn len(&self) -> usize {
        lock(&self.threads).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of registered threads, in spawn order.
    pub fn names(&self) -> Vec<String> {
        lock(&self.threads).iter().map(|t| t.name.clone()).collect()
    }

    /// Join every registered thread. The caller must already have signalled
    /// shutdown; this only waits. Returns how many threads ended in a panic.
    pub fn join_all(&self) -> usize {
        let threads = std::mem::take(&mut *lock(&self.threads));
        let total = threads.len();
        let mut panicked = 0;
        for t in threads {
            if t.handle.join().is_err() {
                error!(thread = %t.name, "kernel thread panicked");
                panicked += 1;
            }
        }
        info!(joined = total, panicked, "kernel threads joined");
        panicked
    }
}

//! Worker thread management
//!
//! Workers are OS threads that run green threads. Each one owns a
//! `WorkerContext` for its whole life: the anchor green threads switch back
//! to, and the reason the last one gave for suspending.

use crate::fiber::Anchor;
use crate::scheduler::Shared;

use lwthread_core::error::{SchedError, SchedResult};
use lwthread_core::id::ThreadId;
use lwthread_core::kerror;

use std::cell::Cell;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Why a green thread handed control back to its worker
///
/// The worker applies the reason only after the switch, once the thread's
/// context is fully saved, so no other worker can pick the thread up early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Park {
    /// Requeue at the tail
    Yield,
    /// Wait for the given thread to finish
    Join(ThreadId),
    /// Hold the worker until the deadline, then requeue
    Sleep(Instant),
}

/// Per-worker execution context
///
/// Lives on the worker's own stack; green threads reach it through
/// [`crate::tls`] while they run on that worker.
pub(crate) struct WorkerContext {
    pub id: usize,
    pub shared: Arc<Shared>,
    pub anchor: Anchor,
    current: Cell<Option<ThreadId>>,
    park: Cell<Option<Park>>,
}

impl WorkerContext {
    pub fn new(id: usize, shared: Arc<Shared>) -> Self {
        Self {
            id,
            shared,
            anchor: Anchor::new(),
            current: Cell::new(None),
            park: Cell::new(None),
        }
    }

    /// Green thread this worker is running, if any
    #[inline]
    pub fn current(&self) -> Option<ThreadId> {
        self.current.get()
    }

    #[inline]
    pub fn set_current(&self, id: Option<ThreadId>) {
        self.current.set(id);
    }

    /// Switch from the running green thread back to the worker loop
    ///
    /// Must be the caller's last use of `self`: the thread may resume on a
    /// different worker.
    pub fn suspend(&self, park: Park) {
        self.park.set(Some(park));
        self.anchor.suspend();
    }

    /// Reason recorded by the last suspension
    #[inline]
    pub fn take_park(&self) -> Option<Park> {
        self.park.take()
    }
}

/// Pool of worker threads
#[derive(Debug, Default)]
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `num_workers` threads, each running `worker_fn(worker_id)`
    ///
    /// On failure the threads already spawned stay in the pool; the caller
    /// must make them exit and then `join` the pool.
    pub fn start<F>(&mut self, num_workers: usize, worker_fn: F) -> SchedResult<()>
    where
        F: Fn(usize) + Send + Clone + 'static,
    {
        self.handles.reserve(num_workers);
        for i in 0..num_workers {
            let worker_fn = worker_fn.clone();
            let handle = thread::Builder::new()
                .name(format!("lwthread-worker-{}", i))
                .spawn(move || worker_fn(i))
                .map_err(|e| {
                    kerror!("failed to spawn worker {}: {}", i, e);
                    SchedError::WorkerSpawn
                })?;
            self.handles.push(handle);
        }
        Ok(())
    }

    /// Wait for all workers to finish
    pub fn join(self) {
        for handle in self.handles {
            let name = handle.thread().name().map(str::to_owned);
            if handle.join().is_err() {
                kerror!("worker {:?} panicked", name);
            }
        }
    }

    /// Number of spawned workers
    #[inline]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

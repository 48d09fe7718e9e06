//! Thread-local pointer to the running worker's context
//!
//! The only ambient state in the runtime: one pointer per OS thread, set
//! for the lifetime of a worker loop. Everything else (scheduler, current
//! green thread, anchor) is reached through the `WorkerContext` it points
//! to, so independent schedulers can coexist in one process.

use crate::worker::WorkerContext;
use std::cell::Cell;
use std::ptr;

thread_local! {
    static CURRENT_WORKER: Cell<*const WorkerContext> = const { Cell::new(ptr::null()) };
}

/// Clears the worker pointer when the worker loop exits
pub(crate) struct WorkerGuard {
    _private: (),
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        CURRENT_WORKER.with(|c| c.set(ptr::null()));
    }
}

/// Publish `ctx` as this OS thread's worker context
pub(crate) fn enter_worker(ctx: &WorkerContext) -> WorkerGuard {
    CURRENT_WORKER.with(|c| c.set(ctx));
    WorkerGuard { _private: () }
}

/// Run `f` with the worker context of the calling OS thread
///
/// Not inlined: a green thread can migrate between workers across a
/// suspension, and the thread-local address must be looked up afresh each
/// time rather than cached from an earlier call on another OS thread.
#[inline(never)]
pub(crate) fn with_worker<R>(f: impl FnOnce(Option<&WorkerContext>) -> R) -> R {
    let ptr = CURRENT_WORKER.with(|c| c.get());
    // SAFETY: the pointer is set by `enter_worker` from a context that
    // outlives the returned guard, and cleared when the guard drops.
    f(unsafe { ptr.as_ref() })
}


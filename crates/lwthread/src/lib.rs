//! # lwthread - lightweight green threads
//!
//! Many cooperative threads multiplexed over a fixed pool of OS workers.
//! Each green thread has its own stack and gives up its worker only at
//! explicit points: `yield_now`, `join`, `sleep`, or returning.
//!
//! ## Quick Start
//!
//! ```ignore
//! use lwthread::{Scheduler, sleep_ms, yield_now};
//!
//! fn main() -> lwthread::SchedResult<()> {
//!     let mut sched = Scheduler::create(2)?;
//!     sched.start()?;
//!
//!     let t = sched.spawn(|| {
//!         for i in 0..3 {
//!             println!("tick {}", i);
//!             sleep_ms(10);
//!             yield_now();
//!         }
//!     })?;
//!
//!     sched.wait(&t)?;
//!     sched.destroy();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      User Code                              │
//! │        spawn(), yield_now(), join(), sleep(), current()     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Scheduler                              │
//! │      ready FIFO, thread table, running slots (one mutex)    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌───────────┐
//!    │  Worker   │      │  Worker   │      │  Worker   │
//!    │  Thread   │      │  Thread   │      │  Thread   │
//!    └───────────┘      └───────────┘      └───────────┘
//!          │                   │                   │
//!          └───────────────────┼───────────────────┘
//!                              ▼
//!    ┌─────────────────────────────────────────────────────────┐
//!    │                       Fibers                            │
//!    │       mmap'd stacks with guard pages, asm switch        │
//!    └─────────────────────────────────────────────────────────┘
//! ```

// Re-export core types
pub use lwthread_core::{ConfigError, MemoryError, SchedError, SchedResult, ThreadId, ThreadState};
pub use lwthread_core::constants::{DEFAULT_STACK_SIZE, MAX_WORKERS, MIN_STACK_SIZE};

// Re-export kprint macros for debug logging
pub use lwthread_core::{kdebug, kerror, kinfo, kprint, kprintln, ktrace, kwarn};
pub use lwthread_core::kprint::{init as init_logging, set_flush_enabled, set_log_level, LogLevel};

// Re-export env utilities
pub use lwthread_core::{env_get, env_get_bool, env_get_opt, env_get_str, env_is_set};

// Re-export runtime types and primitives
pub use lwthread_runtime::{
    current, join, sleep, sleep_ms, spawn, yield_now, ReadyQueue, Scheduler, SchedulerConfig,
    Thread,
};

use std::sync::{Arc, Mutex};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 1;
pub const VERSION_PATCH: u32 = 0;

/// Id of the calling green thread, or `None` outside one
#[inline]
pub fn current_id() -> Option<ThreadId> {
    current().map(|t| t.id())
}

/// Is the caller running inside a green thread?
#[inline]
pub fn is_in_green_thread() -> bool {
    current().is_some()
}

/// Run `f` as a green thread on a fresh scheduler and return its result
///
/// Creates a scheduler with `num_workers` workers, runs `f` on it, waits for
/// it from the calling OS thread, then destroys the scheduler. Threads `f`
/// spawns but does not join may be cut short.
pub fn block_on<F, T>(num_workers: usize, f: F) -> SchedResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let mut sched = Scheduler::create(num_workers)?;
    sched.start()?;

    let slot = Arc::new(Mutex::new(None));
    let out = slot.clone();
    let main = sched.spawn(move || {
        let value = f();
        if let Ok(mut out) = out.lock() {
            *out = Some(value);
        }
    })?;
    sched.wait(&main)?;
    sched.destroy();

    let value = slot.lock().ok().and_then(|mut v| v.take());
    // Finished without storing a value only if `f` panicked
    value.ok_or(SchedError::Panicked(main.id()))
}

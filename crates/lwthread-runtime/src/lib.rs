//! # lwthread-runtime
//!
//! Platform-specific runtime for the lwthread green-thread scheduler.
//!
//! This crate provides:
//! - Stack allocation with guard pages (mmap)
//! - Context switching (architecture-specific assembly)
//! - Fibers: the safe suspend/resume boundary over raw contexts
//! - Worker thread management
//! - The scheduler, its worker loop and the cooperative primitives

pub mod config;
pub mod memory;
pub(crate) mod arch;
pub mod fiber;
pub mod ready_queue;
pub mod thread;
pub mod worker;
pub(crate) mod tls;
pub mod scheduler;

// Re-exports
pub use config::SchedulerConfig;
pub use ready_queue::ReadyQueue;
pub use scheduler::{current, join, sleep, sleep_ms, spawn, yield_now, Scheduler};
pub use thread::Thread;
pub use worker::WorkerPool;

// Architecture detection
cfg_if::cfg_if! {
    if #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))] {
        /// Name of the context-switch backend compiled in
        pub const ARCH: &str = std::env::consts::ARCH;
    } else {
        compile_error!("Unsupported architecture");
    }
}

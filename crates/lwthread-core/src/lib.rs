//! # lwthread-core
//!
//! Core types for the lwthread green-thread scheduler.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! Stacks, context switching and worker threads live in `lwthread-runtime`.
//!
//! ## Modules
//!
//! - `id` - Green thread identifier type
//! - `state` - Green thread state machine
//! - `error` - Error types
//! - `kprint` - Kernel-style debug printing macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod state;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::ThreadId;
pub use state::ThreadState;
pub use error::{ConfigError, MemoryError, SchedError, SchedResult};
pub use env::{env_get, env_get_bool, env_get_opt, env_get_str, env_is_set};

/// Constants shared by the runtime and the public API
pub mod constants {
    /// Maximum workers (OS threads) per scheduler
    pub const MAX_WORKERS: usize = 64;

    /// Default stack size per green thread (64 KB)
    pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

    /// Smallest stack that can hold the initial frame plus a useful call depth
    pub const MIN_STACK_SIZE: usize = 16 * 1024;

    /// Guard page size (4 KB), mapped PROT_NONE below every stack
    pub const GUARD_SIZE: usize = 4096;

    /// No green thread sentinel value
    pub const THREAD_NONE: u32 = u32::MAX;

    /// First id handed out by a fresh scheduler
    pub const FIRST_THREAD_ID: u32 = 1;
}

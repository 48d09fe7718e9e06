//! Scheduler configuration
//!
//! Provides compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Environment variables (runtime)
//! 2. User's lwt_config.rs (compile-time, via `LWT_CONFIG_RS`)
//! 3. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use lwthread_runtime::config::SchedulerConfig;
//!
//! // Use defaults with env overrides
//! let config = SchedulerConfig::from_env();
//!
//! // Or customize programmatically
//! let config = SchedulerConfig::from_env()
//!     .num_workers(2)
//!     .stack_size(128 * 1024);
//! ```

pub mod defaults;

use lwthread_core::constants::{MAX_WORKERS, MIN_STACK_SIZE};
use lwthread_core::env::{env_get_bool, env_get_opt};
use lwthread_core::kwarn;
use lwthread_core::error::ConfigError;

/// Scheduler configuration with builder pattern.
///
/// Use `from_env()` to start with compile-time defaults and apply
/// any environment variable overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Number of worker threads
    pub num_workers: usize,
    /// Default stack size per green thread
    pub stack_size: usize,
    /// Enable debug logging
    pub debug_logging: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl SchedulerConfig {
    /// Create config from compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `LWT_NUM_WORKERS` - Number of worker threads
    /// - `LWT_STACK_SIZE` - Default stack size per green thread
    /// - `LWT_DEBUG` - Enable debug logging (0/1)
    ///
    /// An override that would fail [`validate`](Self::validate) is ignored
    /// with a warning and the compile-time value kept.
    pub fn from_env() -> Self {
        Self::new()
            .debug_logging(env_get_bool("LWT_DEBUG", defaults::DEBUG_LOGGING))
            .apply_overrides(
                env_get_opt("LWT_NUM_WORKERS"),
                env_get_opt("LWT_STACK_SIZE"),
            )
    }

    /// Take each override that passes validation on its own
    fn apply_overrides(mut self, num_workers: Option<usize>, stack_size: Option<usize>) -> Self {
        if let Some(n) = num_workers {
            if (1..=MAX_WORKERS).contains(&n) {
                self.num_workers = n;
            } else {
                kwarn!("LWT_NUM_WORKERS={} out of range; using {}", n, self.num_workers);
            }
        }
        if let Some(size) = stack_size {
            if size >= MIN_STACK_SIZE {
                self.stack_size = size;
            } else {
                kwarn!("LWT_STACK_SIZE={} below minimum; using {}", size, self.stack_size);
            }
        }
        self
    }

    /// Create config with explicit defaults (no env override).
    /// Useful for testing or when you want full control.
    pub fn new() -> Self {
        Self {
            num_workers: defaults::NUM_WORKERS,
            stack_size: defaults::STACK_SIZE,
            debug_logging: defaults::DEBUG_LOGGING,
        }
    }

    // Builder methods

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_workers == 0 {
            return Err(ConfigError::InvalidValue("num_workers must be > 0"));
        }
        if self.num_workers > MAX_WORKERS {
            return Err(ConfigError::InvalidValue("num_workers must be <= 64"));
        }
        if self.stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::InvalidValue("stack_size must be >= 16KB"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        lwthread_core::kprintln!("lwthread configuration:");
        lwthread_core::kprintln!("  num_workers:    {}", self.num_workers);
        lwthread_core::kprintln!("  stack_size:     {}", self.stack_size);
        lwthread_core::kprintln!("  debug_logging:  {}", self.debug_logging);
    }
}

//! Error types for the lwthread scheduler

use crate::id::ThreadId;
use core::fmt;

/// Result type for scheduler operations
pub type SchedResult<T> = Result<T, SchedError>;

/// Errors that can occur in scheduler operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedError {
    /// A handle, count or size argument is out of range
    InvalidArgument(&'static str),

    /// Stack or scheduler structure allocation failed
    AllocationFailure(MemoryError),

    /// The execution context could not be bound to the new stack
    ContextFailure,

    /// The target thread already has a waiter recorded
    JoinConflict(ThreadId),

    /// The thread's entry function panicked
    Panicked(ThreadId),

    /// The OS refused to create a worker thread
    WorkerSpawn,

    /// Configuration rejected by validation
    Config(ConfigError),
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            SchedError::AllocationFailure(e) => write!(f, "allocation failure: {}", e),
            SchedError::ContextFailure => write!(f, "failed to bind execution context"),
            SchedError::JoinConflict(id) => {
                write!(f, "thread {} already has a waiter", id)
            }
            SchedError::Panicked(id) => write!(f, "thread {} panicked", id),
            SchedError::WorkerSpawn => write!(f, "failed to spawn worker thread"),
            SchedError::Config(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SchedError {}

/// Memory-related errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// mmap failed
    MapFailed(i32),

    /// mprotect on the guard page failed
    ProtectionFailed(i32),

    /// Requested size overflows the address space
    SizeOverflow,
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::MapFailed(errno) => write!(f, "stack mapping failed (errno {})", errno),
            MemoryError::ProtectionFailed(errno) => {
                write!(f, "guard page protection failed (errno {})", errno)
            }
            MemoryError::SizeOverflow => write!(f, "stack size overflow"),
        }
    }
}

impl From<MemoryError> for SchedError {
    fn from(e: MemoryError) -> Self {
        SchedError::AllocationFailure(e)
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for SchedError {
    fn from(e: ConfigError) -> Self {
        SchedError::Config(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = SchedError::InvalidArgument("num_workers must be > 0");
        assert_eq!(format!("{}", e), "invalid argument: num_workers must be > 0");

        let e = SchedError::AllocationFailure(MemoryError::MapFailed(12));
        assert_eq!(
            format!("{}", e),
            "allocation failure: stack mapping failed (errno 12)"
        );

        let e = SchedError::JoinConflict(ThreadId::new(3));
        assert_eq!(format!("{}", e), "thread 3 already has a waiter");

        let e = SchedError::Panicked(ThreadId::new(4));
        assert_eq!(format!("{}", e), "thread 4 panicked");
    }

    #[test]
    fn test_error_conversion() {
        let sched_err: SchedError = MemoryError::SizeOverflow.into();
        assert!(matches!(
            sched_err,
            SchedError::AllocationFailure(MemoryError::SizeOverflow)
        ));

        let sched_err: SchedError = ConfigError::InvalidValue("x").into();
        assert_eq!(format!("{}", sched_err), "invalid config: x");
    }
}

//! Green thread state machine
//!
//! ```text
//! New -> Ready -> Running -> (Blocked -> Ready -> Running)* -> Finished
//!                    |  ^
//!                    +--+  yield (Running -> Ready -> Running)
//! ```
//!
//! `Finished` is terminal.

use core::fmt;

/// State of a green thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Just created, not yet queued
    New,

    /// Ready to run, in the ready queue
    Ready,

    /// Currently executing on a worker
    Running,

    /// Blocked in join or sleep
    Blocked,

    /// Entry function returned; terminal
    Finished,
}

impl ThreadState {
    /// Check if the thread has terminated
    #[inline]
    pub const fn is_finished(&self) -> bool {
        matches!(self, ThreadState::Finished)
    }

    /// Check whether `self -> next` is an edge of the state machine
    pub const fn can_transition_to(&self, next: ThreadState) -> bool {
        use ThreadState::*;
        matches!(
            (*self, next),
            (New, Ready)
                | (Ready, Running)
                | (Running, Ready)
                | (Running, Blocked)
                | (Running, Finished)
                | (Blocked, Ready)
        )
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadState::New => write!(f, "NEW"),
            ThreadState::Ready => write!(f, "READY"),
            ThreadState::Running => write!(f, "RUNNING"),
            ThreadState::Blocked => write!(f, "BLOCKED"),
            ThreadState::Finished => write!(f, "FINISHED"),
        }
    }
}

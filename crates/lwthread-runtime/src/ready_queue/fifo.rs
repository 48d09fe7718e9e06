//! Plain FIFO of thread ids
//!
//! No locking of its own: the scheduler keeps one inside its state mutex and
//! calls it with the lock already held.

use lwthread_core::id::ThreadId;
use std::collections::VecDeque;

/// Arrival-ordered queue of runnable thread ids
#[derive(Debug, Default)]
pub struct Fifo {
    queue: VecDeque<ThreadId>,
}

impl Fifo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append at the tail
    #[inline]
    pub fn push(&mut self, id: ThreadId) {
        self.queue.push_back(id);
    }

    /// Remove from the head
    #[inline]
    pub fn pop(&mut self) -> Option<ThreadId> {
        self.queue.pop_front()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Drop every queued id
    pub fn clear(&mut self) {
        self.queue.clear();
    }
}

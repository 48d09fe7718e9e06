//! Ready queue for green thread scheduling
//!
//! Insertion order is dispatch order; there is no priority and no
//! deduplication. A thread is never pushed twice because its state machine
//! only allows one READY transition per suspension.
//!
//! # Implementations
//! - `Fifo` - unlocked queue, for callers that already hold a lock
//! - `ReadyQueue` - the same queue behind its own mutex

mod fifo;

pub use fifo::Fifo;

use lwthread_core::id::ThreadId;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Self-locking FIFO, safe to share between workers
#[derive(Debug, Default)]
pub struct ReadyQueue {
    inner: Mutex<Fifo>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the queue, for a batch of operations under one acquisition
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, Fifo> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append at the tail
    pub fn push(&self, id: ThreadId) {
        self.lock().push(id);
    }

    /// Remove from the head
    pub fn pop(&self) -> Option<ThreadId> {
        self.lock().pop()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fresh_queue_is_empty() {
        let q = ReadyQueue::new();
        assert_eq!(q.len(), 0);
        assert!(q.is_empty());
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn test_fifo_order() {
        let q = ReadyQueue::new();
        for i in 1..=5 {
            q.push(ThreadId::new(i));
        }
        assert_eq!(q.pop(), Some(ThreadId::new(1)));
        assert_eq!(q.pop(), Some(ThreadId::new(2)));
        assert_eq!(q.len(), 3);
        assert!(!q.is_empty());

        q.push(ThreadId::new(9));
        let rest: Vec<u32> = std::iter::from_fn(|| q.pop()).map(|id| id.as_u32()).collect();
        assert_eq!(rest, vec![3, 4, 5, 9]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_locked_batch() {
        let q = ReadyQueue::new();
        {
            let mut fifo = q.lock();
            fifo.push(ThreadId::new(1));
            fifo.push(ThreadId::new(2));
            assert_eq!(fifo.len(), 2);
        }
        assert_eq!(q.len(), 2);
        q.lock().clear();
        assert!(q.is_empty());
    }

    #[test]
    fn test_concurrent_push_pop() {
        let q = Arc::new(ReadyQueue::new());
        let producers: Vec<_> = (0..4u32)
            .map(|p| {
                let q = q.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        q.push(ThreadId::new(p * 1000 + i));
                    }
                })
            })
            .collect();
        for h in producers {
            h.join().unwrap();
        }
        assert_eq!(q.len(), 400);

        let mut popped = 0;
        while q.pop().is_some() {
            popped += 1;
        }
        assert_eq!(popped, 400);
    }

    #[test]
    fn test_large_backlog() {
        let mut fifo = Fifo::new();
        for i in 1..=200_000u32 {
            fifo.push(ThreadId::new(i));
        }
        assert_eq!(fifo.len(), 200_000);
        assert_eq!(fifo.pop(), Some(ThreadId::new(1)));
        assert_eq!(fifo.len(), 199_999);
    }
}

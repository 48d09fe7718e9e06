//! Green thread bookkeeping
//!
//! Every green thread a scheduler knows about lives in its `ThreadTable`,
//! keyed by id. The ready queue and the per-worker running slots hold ids
//! only, so there is one owner for each thread's fiber and stack.
//!
//! While a thread runs, its fiber is moved out of the table and into the
//! worker that resumed it; the worker puts it back after the thread
//! suspends. A finished thread is removed from the table ("retired") and its
//! stack is freed when the worker drops the fiber.

use crate::fiber::Fiber;
use crate::scheduler::Shared;

use lwthread_core::constants::FIRST_THREAD_ID;
use lwthread_core::error::{SchedError, SchedResult};
use lwthread_core::id::ThreadId;
use lwthread_core::state::ThreadState;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// A green thread's scheduler-side record
pub(crate) struct GreenThread {
    pub state: ThreadState,
    /// The one thread joined on this one, if any
    pub waiting: Option<ThreadId>,
    /// `None` while a worker is running the thread
    pub fiber: Option<Fiber>,
}

/// Result of recording a joiner on a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Reservation {
    /// Target already finished; the joiner must not suspend
    Finished,
    /// Joiner recorded; it will be made ready when the target finishes
    Recorded,
    /// Another thread is already waiting on the target
    Conflict,
}

/// Arena of green threads, owned by the scheduler state
pub(crate) struct ThreadTable {
    threads: HashMap<ThreadId, GreenThread>,
    next_id: ThreadId,
}

impl ThreadTable {
    pub fn new() -> Self {
        Self {
            threads: HashMap::new(),
            next_id: ThreadId::new(FIRST_THREAD_ID),
        }
    }

    /// Insert a new thread in state NEW under a fresh id
    pub fn insert(&mut self, fiber: Fiber) -> SchedResult<ThreadId> {
        let id = self.next_id;
        if id.is_none() {
            return Err(SchedError::InvalidArgument("thread id space exhausted"));
        }
        self.next_id = id.next();
        self.threads.insert(
            id,
            GreenThread {
                state: ThreadState::New,
                waiting: None,
                fiber: Some(fiber),
            },
        );
        Ok(id)
    }

    /// Was `id` handed out by this table?
    #[inline]
    pub fn issued(&self, id: ThreadId) -> bool {
        id.as_u32() >= FIRST_THREAD_ID && id.as_u32() < self.next_id.as_u32()
    }

    /// Current state; retired threads read as FINISHED
    pub fn state_of(&self, id: ThreadId) -> Option<ThreadState> {
        match self.threads.get(&id) {
            Some(t) => Some(t.state),
            None if self.issued(id) => Some(ThreadState::Finished),
            None => None,
        }
    }

    pub fn is_finished(&self, id: ThreadId) -> bool {
        self.state_of(id).map_or(false, |s| s.is_finished())
    }

    /// Move a thread along its state machine
    ///
    /// Returns false if the thread is gone.
    pub fn set_state(&mut self, id: ThreadId, next: ThreadState) -> bool {
        match self.threads.get_mut(&id) {
            Some(t) => {
                debug_assert!(
                    t.state.can_transition_to(next),
                    "thread {}: {} -> {}",
                    id,
                    t.state,
                    next
                );
                t.state = next;
                true
            }
            None => false,
        }
    }

    /// Hand the fiber to a worker for dispatch
    pub fn take_fiber(&mut self, id: ThreadId) -> Option<Fiber> {
        self.threads.get_mut(&id).and_then(|t| t.fiber.take())
    }

    /// Give the fiber back after the thread suspended
    pub fn restore_fiber(&mut self, id: ThreadId, fiber: Fiber) {
        if let Some(t) = self.threads.get_mut(&id) {
            debug_assert!(t.fiber.is_none());
            t.fiber = Some(fiber);
        }
    }

    /// Record `waiter` as the joiner of `target`
    pub fn reserve_waiter(&mut self, target: ThreadId, waiter: ThreadId) -> Reservation {
        match self.threads.get_mut(&target) {
            None => Reservation::Finished,
            Some(t) if t.state.is_finished() => Reservation::Finished,
            Some(t) => match t.waiting {
                Some(other) if other != waiter => Reservation::Conflict,
                _ => {
                    t.waiting = Some(waiter);
                    Reservation::Recorded
                }
            },
        }
    }

    /// Mark a thread FINISHED and drop its record
    ///
    /// Returns the record, whose `waiting` field names the thread to wake.
    pub fn retire(&mut self, id: ThreadId) -> Option<GreenThread> {
        let mut t = self.threads.remove(&id)?;
        t.state = ThreadState::Finished;
        Some(t)
    }

    /// Threads not yet retired
    #[inline]
    pub fn live(&self) -> usize {
        self.threads.len()
    }
}

/// Handle to a green thread
///
/// Cheap to clone. A handle does not keep its scheduler alive; once the
/// scheduler is destroyed, `state()` returns `None`.
#[derive(Clone)]
pub struct Thread {
    id: ThreadId,
    pub(crate) shared: Weak<Shared>,
}

impl Thread {
    pub(crate) fn new(id: ThreadId, shared: &Arc<Shared>) -> Self {
        Self {
            id,
            shared: Arc::downgrade(shared),
        }
    }

    /// Scheduler-unique id
    #[inline]
    pub fn id(&self) -> ThreadId {
        self.id
    }

    /// Current state, or `None` if the scheduler is gone
    pub fn state(&self) -> Option<ThreadState> {
        let shared = self.shared.upgrade()?;
        let state = shared.lock().threads.state_of(self.id);
        state
    }

    /// Has the thread run to completion?
    pub fn is_finished(&self) -> bool {
        self.state().map_or(false, |s| s.is_finished())
    }

    /// Does this handle belong to the scheduler behind `shared`?
    #[inline]
    pub(crate) fn belongs_to(&self, shared: &Arc<Shared>) -> bool {
        std::ptr::eq(self.shared.as_ptr(), Arc::as_ptr(shared))
    }
}

impl PartialEq for Thread {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.shared.ptr_eq(&other.shared)
    }
}

impl Eq for Thread {}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fiber() -> Fiber {
        Fiber::new(64 * 1024, || {}).expect("fiber")
    }

    #[test]
    fn test_ids_start_at_one_and_increase() {
        let mut table = ThreadTable::new();
        let a = table.insert(fiber()).unwrap();
        let b = table.insert(fiber()).unwrap();
        assert_eq!(a.as_u32(), FIRST_THREAD_ID);
        assert_eq!(b.as_u32(), FIRST_THREAD_ID + 1);
        assert_eq!(table.state_of(a), Some(ThreadState::New));
        assert_eq!(table.live(), 2);
    }

    #[test]
    fn test_unknown_and_retired_ids() {
        let mut table = ThreadTable::new();
        assert_eq!(table.state_of(ThreadId::new(7)), None);

        let id = table.insert(fiber()).unwrap();
        let record = table.retire(id).expect("record");
        assert_eq!(record.state, ThreadState::Finished);
        assert_eq!(table.state_of(id), Some(ThreadState::Finished));
        assert!(table.is_finished(id));
        assert_eq!(table.live(), 0);
        assert!(table.retire(id).is_none());
    }

    #[test]
    fn test_fiber_ownership_moves() {
        let mut table = ThreadTable::new();
        let id = table.insert(fiber()).unwrap();
        let f = table.take_fiber(id).expect("fiber");
        assert!(table.take_fiber(id).is_none());
        table.restore_fiber(id, f);
        assert!(table.take_fiber(id).is_some());
    }

    #[test]
    fn test_state_machine_walk() {
        let mut table = ThreadTable::new();
        let id = table.insert(fiber()).unwrap();
        assert!(table.set_state(id, ThreadState::Ready));
        assert!(table.set_state(id, ThreadState::Running));
        assert!(table.set_state(id, ThreadState::Blocked));
        assert!(table.set_state(id, ThreadState::Ready));
        assert!(!table.set_state(ThreadId::new(99), ThreadState::Ready));
    }

    // Double enqueue is caught at the READY transition, not by the queue
    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "READY -> READY")]
    fn test_double_ready_rejected() {
        let mut table = ThreadTable::new();
        let id = table.insert(fiber()).unwrap();
        table.set_state(id, ThreadState::Ready);
        table.set_state(id, ThreadState::Ready);
    }

    #[test]
    fn test_single_waiter_reservation() {
        let mut table = ThreadTable::new();
        let target = table.insert(fiber()).unwrap();
        let first = ThreadId::new(50);
        let second = ThreadId::new(51);

        assert_eq!(table.reserve_waiter(target, first), Reservation::Recorded);
        // Same waiter again is fine
        assert_eq!(table.reserve_waiter(target, first), Reservation::Recorded);
        assert_eq!(table.reserve_waiter(target, second), Reservation::Conflict);

        let record = table.retire(target).unwrap();
        assert_eq!(record.waiting, Some(first));
        assert_eq!(table.reserve_waiter(target, second), Reservation::Finished);
    }
}

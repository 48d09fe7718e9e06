//! Fibers: a stack plus a saved execution context
//!
//! This is the only module that touches raw contexts. It exposes two safe
//! halves of a switch:
//!
//! - [`Fiber::resume`] runs a fiber on the calling OS thread until it
//!   suspends or its entry closure returns.
//! - [`Anchor::suspend`] is called from inside the running fiber and hands
//!   control back to whoever resumed it.
//!
//! An [`Anchor`] is the resumer's own saved context. It is neither `Send`
//! nor `Sync`, so a fiber can only reach the anchor of the OS thread it is
//! currently running on.
//!
//! The entry closure runs under `catch_unwind`; a panic ends the fiber
//! instead of unwinding across a context switch.

use crate::arch::{self, Context};
use crate::memory::Stack;
use lwthread_core::constants::MIN_STACK_SIZE;
use lwthread_core::error::{SchedError, SchedResult};

use std::cell::{Cell, UnsafeCell};
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

/// Outcome of a [`Fiber::resume`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// The fiber called [`Anchor::suspend`] and can be resumed again
    Suspended,
    /// The entry closure returned
    Finished,
    /// The entry closure panicked
    Panicked,
}

/// Resumption point of the OS thread that runs fibers
pub struct Anchor {
    home: UnsafeCell<Context>,
    /// Context slot of the fiber currently resumed from here, or null
    active: Cell<*mut Context>,
    _not_send: PhantomData<*mut ()>,
}

impl Anchor {
    pub const fn new() -> Self {
        Self {
            home: UnsafeCell::new(Context::zeroed()),
            active: Cell::new(ptr::null_mut()),
            _not_send: PhantomData,
        }
    }

    /// Is a fiber currently resumed from this anchor?
    #[inline]
    pub fn is_active(&self) -> bool {
        !self.active.get().is_null()
    }

    /// Switch from the running fiber back to the resumer
    ///
    /// Returns when the fiber is next resumed, possibly from a different
    /// anchor on a different OS thread. Does nothing if no fiber is running.
    pub fn suspend(&self) {
        let active = self.active.get();
        if active.is_null() {
            return;
        }
        // SAFETY: `active` is set only for the duration of `Fiber::resume`,
        // and the only code running on this OS thread during that window is
        // the fiber itself, so we are on the fiber's stack. `home` was filled
        // by the switch in `resume`.
        unsafe { arch::switch_context(active, self.home.get()) }
    }
}

impl Default for Anchor {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Pending,
    Returned,
    Panicked,
}

struct FiberInner {
    ctx: UnsafeCell<Context>,
    /// Anchor of the most recent resume
    anchor: Cell<*const Anchor>,
    entry: Cell<Option<Box<dyn FnOnce() + Send>>>,
    outcome: Cell<Outcome>,
    stack: Stack,
}

/// A suspended computation with its own stack
///
/// Moving a `Fiber` between OS threads is fine while it is not running;
/// `resume` takes `&mut self`, so one fiber never runs on two threads.
pub struct Fiber {
    inner: Box<FiberInner>,
}

// The closure is Send and the context only refers to the fiber's own stack.
unsafe impl Send for Fiber {}

impl Fiber {
    /// Allocate a stack of `stack_size` bytes and bind `f` to it
    ///
    /// Fails with `ContextFailure` if the stack is too small to hold the
    /// initial frame, or `AllocationFailure` if it cannot be mapped.
    pub fn new<F>(stack_size: usize, f: F) -> SchedResult<Fiber>
    where
        F: FnOnce() + Send + 'static,
    {
        if stack_size < MIN_STACK_SIZE {
            return Err(SchedError::ContextFailure);
        }
        let stack = Stack::new(stack_size)?;

        let inner = Box::new(FiberInner {
            ctx: UnsafeCell::new(Context::zeroed()),
            anchor: Cell::new(ptr::null()),
            entry: Cell::new(Some(Box::new(f))),
            outcome: Cell::new(Outcome::Pending),
            stack,
        });

        // SAFETY: the context slot and stack both live in `inner`, whose heap
        // address is stable for the life of the fiber.
        unsafe {
            arch::init_context(
                inner.ctx.get(),
                inner.stack.top(),
                fiber_entry,
                &*inner as *const FiberInner as usize,
            );
        }

        Ok(Fiber { inner })
    }

    /// Usable stack size in bytes
    #[inline]
    pub fn stack_size(&self) -> usize {
        self.inner.stack.size()
    }

    /// Run the fiber until it suspends or finishes
    ///
    /// Resuming a finished fiber returns its final outcome again without
    /// switching.
    pub fn resume(&mut self, anchor: &Anchor) -> Resume {
        if let Some(done) = self.final_outcome() {
            return done;
        }
        debug_assert!(!anchor.is_active(), "anchor already has a running fiber");

        let ctx = self.inner.ctx.get();
        self.inner.anchor.set(anchor);
        anchor.active.set(ctx);
        // SAFETY: `ctx` holds a context from `init_context` or from the
        // fiber's last `Anchor::suspend`; `&mut self` guarantees no other
        // thread is running it.
        unsafe { arch::switch_context(anchor.home.get(), ctx) }
        anchor.active.set(ptr::null_mut());

        self.final_outcome().unwrap_or(Resume::Suspended)
    }

    fn final_outcome(&self) -> Option<Resume> {
        match self.inner.outcome.get() {
            Outcome::Pending => None,
            Outcome::Returned => Some(Resume::Finished),
            Outcome::Panicked => Some(Resume::Panicked),
        }
    }
}

impl std::fmt::Debug for Fiber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fiber")
            .field("stack_size", &self.stack_size())
            .field("outcome", &self.inner.outcome.get())
            .finish()
    }
}

/// First frame on every fiber stack
extern "C" fn fiber_entry(arg: usize) -> ! {
    // SAFETY: `arg` is the FiberInner address passed by `Fiber::new`; the
    // box outlives every resume.
    let inner = unsafe { &*(arg as *const FiberInner) };

    if let Some(f) = inner.entry.take() {
        let outcome = match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(()) => Outcome::Returned,
            Err(_payload) => Outcome::Panicked,
        };
        inner.outcome.set(outcome);
    }

    // Read the anchor only now: the fiber may have migrated since it started.
    let anchor = inner.anchor.get();
    if !anchor.is_null() {
        // SAFETY: set by the resume that is currently running us.
        unsafe { (*anchor).suspend() };
    }

    // A finished fiber is never switched into again.
    std::process::abort()
}

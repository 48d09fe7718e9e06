//! Scheduler and worker loop
//!
//! A `Scheduler` owns a fixed pool of workers and one mutex-guarded state
//! block: the ready queue, the thread table, the per-worker running slots
//! and the running flag. Every state transition of a green thread happens
//! under that mutex, except while the thread is in flight on a worker.
//!
//! Suspension is a two-step hand-off. The green thread records why it is
//! stopping (`Park`) and switches to its worker; the worker then applies
//! the reason under the lock. A thread therefore never becomes visible in
//! the ready queue before its context has been saved.
//!
//! Schedulers are independent values: several may run in one process.

use crate::config::SchedulerConfig;
use crate::fiber::{Fiber, Resume};
use crate::ready_queue::Fifo;
use crate::thread::{Reservation, Thread, ThreadTable};
use crate::tls;
use crate::worker::{Park, WorkerContext, WorkerPool};

use lwthread_core::constants::MAX_WORKERS;
use lwthread_core::error::{SchedError, SchedResult};
use lwthread_core::id::ThreadId;
use lwthread_core::kprint;
use lwthread_core::state::ThreadState;
use lwthread_core::{kdebug, kerror, ktrace, kwarn};

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Everything guarded by the scheduler mutex
pub(crate) struct SchedState {
    pub ready: Fifo,
    pub threads: ThreadTable,
    /// Green thread each worker is running, by worker id
    pub running: Vec<Option<ThreadId>>,
    pub running_flag: bool,
}

impl SchedState {
    /// READY + enqueue; the caller signals a worker after unlocking
    fn make_ready(&mut self, id: ThreadId) {
        if self.threads.set_state(id, ThreadState::Ready) {
            self.ready.push(id);
        }
    }

    /// Admit a NEW thread to the ready queue
    fn add_thread(&mut self, id: ThreadId) -> SchedResult<()> {
        if self.threads.state_of(id) != Some(ThreadState::New) {
            return Err(SchedError::InvalidArgument("thread is not new"));
        }
        self.make_ready(id);
        Ok(())
    }
}

/// State shared by the scheduler handle, its workers and thread handles
pub(crate) struct Shared {
    pub config: SchedulerConfig,
    state: Mutex<SchedState>,
    /// Ready work exists or shutdown was requested
    work_cond: Condvar,
    /// Some green thread finished
    done_cond: Condvar,
}

impl Shared {
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, SchedState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a green thread on `shared` and queue it
fn spawn_on<F>(shared: &Arc<Shared>, stack_size: usize, f: F) -> SchedResult<Thread>
where
    F: FnOnce() + Send + 'static,
{
    if stack_size == 0 {
        return Err(SchedError::InvalidArgument("stack_size must be > 0"));
    }
    // Stack mapping happens outside the lock.
    let fiber = Fiber::new(stack_size, f)?;

    let id = {
        let mut state = shared.lock();
        let id = state.threads.insert(fiber)?;
        state.add_thread(id)?;
        id
    };
    shared.work_cond.notify_one();

    if shared.config.debug_logging {
        kdebug!("spawned thread {} ({} byte stack)", id, stack_size);
    }
    Ok(Thread::new(id, shared))
}

/// A green thread scheduler
///
/// Created inert; `start` spawns the workers. Dropping the scheduler stops
/// it. Threads still unfinished at that point are discarded along with
/// their stacks, without running destructors of values on those stacks.
pub struct Scheduler {
    shared: Arc<Shared>,
    workers: Option<WorkerPool>,
    /// Workers told to exit but not yet joined
    exiting: Option<WorkerPool>,
}

impl Scheduler {
    /// Create a scheduler with `num_workers` workers
    ///
    /// Fails with `InvalidArgument` unless `1 <= num_workers <= MAX_WORKERS`.
    /// Other settings come from [`SchedulerConfig::from_env`], which skips
    /// invalid environment overrides, so an in-range count always succeeds.
    pub fn create<N>(num_workers: N) -> SchedResult<Scheduler>
    where
        N: TryInto<usize>,
    {
        let n = num_workers
            .try_into()
            .map_err(|_| SchedError::InvalidArgument("num_workers out of range"))?;
        if n == 0 || n > MAX_WORKERS {
            return Err(SchedError::InvalidArgument("num_workers out of range"));
        }
        Self::with_config(SchedulerConfig::from_env().num_workers(n))
    }

    /// Create a scheduler from an explicit configuration
    pub fn with_config(config: SchedulerConfig) -> SchedResult<Scheduler> {
        config.validate()?;
        if config.debug_logging {
            config.print();
        }

        let n = config.num_workers;
        let shared = Arc::new(Shared {
            config,
            state: Mutex::new(SchedState {
                ready: Fifo::new(),
                threads: ThreadTable::new(),
                running: vec![None; n],
                running_flag: false,
            }),
            work_cond: Condvar::new(),
            done_cond: Condvar::new(),
        });

        Ok(Scheduler {
            shared,
            workers: None,
            exiting: None,
        })
    }

    /// Spawn the workers; no-op if already running
    ///
    /// If a worker cannot be spawned, the ones already started are stopped
    /// again and `WorkerSpawn` is returned.
    pub fn start(&mut self) -> SchedResult<()> {
        if self.workers.is_some() {
            return Ok(());
        }
        if self.exiting.is_some() {
            if self.on_own_worker() {
                return Err(SchedError::InvalidArgument(
                    "workers from the last stop are still exiting",
                ));
            }
            self.stop();
        }

        self.shared.lock().running_flag = true;

        let mut pool = WorkerPool::new();
        let shared = self.shared.clone();
        let started = pool.start(self.shared.config.num_workers, move |worker_id| {
            worker_main_loop(shared.clone(), worker_id)
        });

        if let Err(e) = started {
            self.shared.lock().running_flag = false;
            self.shared.work_cond.notify_all();
            pool.join();
            return Err(e);
        }

        kdebug!("scheduler started ({} workers)", pool.len());
        self.workers = Some(pool);
        Ok(())
    }

    /// Halt the workers; no-op if not running
    ///
    /// Workers drain the ready queue before exiting, and a worker holding a
    /// sleeping thread finishes that sleep first. Threads blocked in `join`
    /// stay blocked and resume after a restart.
    ///
    /// Called from one of this scheduler's own green threads, `stop` does
    /// not wait. The workers still exit once the queue is drained (the
    /// caller's own worker after the caller suspends or returns), and are
    /// joined by the next `start` or `stop` made from outside. If the
    /// scheduler is dropped first they are detached instead.
    pub fn stop(&mut self) {
        if let Some(pool) = self.workers.take() {
            self.shared.lock().running_flag = false;
            self.shared.work_cond.notify_all();
            self.exiting = Some(pool);
        }

        if self.on_own_worker() {
            if self.exiting.is_some() {
                kdebug!("scheduler stopping from its own worker; not joining");
            }
            return;
        }
        if let Some(pool) = self.exiting.take() {
            pool.join();
            kdebug!("scheduler stopped");
        }
    }

    /// Is the caller running on one of this scheduler's workers?
    fn on_own_worker(&self) -> bool {
        tls::with_worker(|w| w.map_or(false, |w| Arc::ptr_eq(&w.shared, &self.shared)))
    }

    /// Stop and release the scheduler
    pub fn destroy(mut self) {
        self.stop();
    }

    /// Spawn a green thread with the configured stack size
    pub fn spawn<F>(&self, f: F) -> SchedResult<Thread>
    where
        F: FnOnce() + Send + 'static,
    {
        spawn_on(&self.shared, self.shared.config.stack_size, f)
    }

    /// Spawn a green thread with an explicit stack size
    pub fn spawn_with_stack<F>(&self, stack_size: usize, f: F) -> SchedResult<Thread>
    where
        F: FnOnce() + Send + 'static,
    {
        spawn_on(&self.shared, stack_size, f)
    }

    /// Block until `thread` finishes
    ///
    /// From an ordinary OS thread this blocks that OS thread. From a green
    /// thread of this scheduler it is the same as [`join`].
    pub fn wait(&self, thread: &Thread) -> SchedResult<()> {
        if !thread.belongs_to(&self.shared) {
            return Err(SchedError::InvalidArgument("thread belongs to another scheduler"));
        }
        let in_own_thread = tls::with_worker(|w| {
            w.map_or(false, |w| {
                w.current().is_some() && Arc::ptr_eq(&w.shared, &self.shared)
            })
        });
        if in_own_thread {
            return join(thread);
        }

        let mut state = self.shared.lock();
        loop {
            match state.threads.state_of(thread.id()) {
                Some(ThreadState::Finished) => return Ok(()),
                Some(_) => {}
                None => return Err(SchedError::InvalidArgument("unknown thread")),
            }
            if self.workers.is_none() {
                return Err(SchedError::InvalidArgument("scheduler is not running"));
            }
            state = self
                .shared
                .done_cond
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// State of a thread of this scheduler
    pub fn state_of(&self, thread: &Thread) -> Option<ThreadState> {
        if !thread.belongs_to(&self.shared) {
            return None;
        }
        let state = self.shared.lock().threads.state_of(thread.id());
        state
    }

    #[inline]
    pub fn num_workers(&self) -> usize {
        self.shared.config.num_workers
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.workers.is_some()
    }

    /// Threads waiting in the ready queue
    pub fn ready_len(&self) -> usize {
        self.shared.lock().ready.len()
    }

    /// Threads created and not yet finished
    pub fn live_threads(&self) -> usize {
        self.shared.lock().threads.live()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("num_workers", &self.num_workers())
            .field("running", &self.is_running())
            .finish()
    }
}

// ============================================================================
// Worker loop
// ============================================================================

/// Main worker loop
fn worker_main_loop(shared: Arc<Shared>, worker_id: usize) {
    let debug = shared.config.debug_logging;
    let ctx = WorkerContext::new(worker_id, shared);
    let _tls = tls::enter_worker(&ctx);

    kprint::set_worker_id(worker_id as u32);
    if debug {
        kdebug!("started");
    }

    while let Some((id, fiber)) = next_runnable(&ctx) {
        run_green_thread(&ctx, id, fiber, debug);
    }

    if debug {
        kdebug!("exiting");
    }
    kprint::clear_worker_id();
}

/// Wait for work, pop it and mark it RUNNING on this worker
///
/// Returns `None` once the running flag is clear and the queue is empty.
fn next_runnable(ctx: &WorkerContext) -> Option<(ThreadId, Fiber)> {
    let shared = &ctx.shared;
    let mut state = shared.lock();
    loop {
        if let Some(id) = state.ready.pop() {
            match state.threads.take_fiber(id) {
                Some(fiber) => {
                    state.threads.set_state(id, ThreadState::Running);
                    state.running[ctx.id] = Some(id);
                    return Some((id, fiber));
                }
                None => {
                    kwarn!("thread {} queued without a context", id);
                    continue;
                }
            }
        }
        if !state.running_flag {
            return None;
        }
        state = shared
            .work_cond
            .wait(state)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

/// Run a green thread until it suspends, then settle it
fn run_green_thread(ctx: &WorkerContext, id: ThreadId, mut fiber: Fiber, debug: bool) {
    ctx.set_current(Some(id));
    kprint::set_thread_id(id.as_u32());
    if debug {
        ktrace!("dispatch");
    }

    let outcome = fiber.resume(&ctx.anchor);

    kprint::clear_thread_id();
    ctx.set_current(None);

    match outcome {
        Resume::Suspended => {
            let park = ctx.take_park().unwrap_or(Park::Yield);
            if debug {
                ktrace!("thread {} suspended ({:?})", id, park);
            }
            settle(ctx, id, fiber, park);
        }
        Resume::Finished => {
            if debug {
                ktrace!("thread {} finished", id);
            }
            finish(ctx, id, fiber);
        }
        Resume::Panicked => {
            kerror!("thread {} panicked", id);
            finish(ctx, id, fiber);
        }
    }
}

/// Apply a suspension reason now that the thread's context is saved
fn settle(ctx: &WorkerContext, id: ThreadId, fiber: Fiber, park: Park) {
    let shared = &ctx.shared;
    let mut state = shared.lock();
    state.running[ctx.id] = None;
    state.threads.restore_fiber(id, fiber);

    match park {
        Park::Yield => {
            state.make_ready(id);
            drop(state);
            shared.work_cond.notify_one();
        }
        Park::Join(target) => {
            // The target may have finished while we were switching out.
            if state.threads.is_finished(target) {
                state.make_ready(id);
                drop(state);
                shared.work_cond.notify_one();
            } else {
                state.threads.set_state(id, ThreadState::Blocked);
            }
        }
        Park::Sleep(deadline) => {
            state.threads.set_state(id, ThreadState::Blocked);
            drop(state);

            // Holds this worker for the whole sleep.
            sleep_until(deadline);

            shared.lock().make_ready(id);
            shared.work_cond.notify_one();
        }
    }
}

/// Retire a finished thread and wake its waiter
fn finish(ctx: &WorkerContext, id: ThreadId, fiber: Fiber) {
    let shared = &ctx.shared;
    let mut state = shared.lock();
    state.running[ctx.id] = None;

    let waiter = state.threads.retire(id).and_then(|t| t.waiting);
    // A waiter still in flight settles itself when its join is applied.
    let woke = match waiter {
        Some(w) if state.threads.state_of(w) == Some(ThreadState::Blocked) => {
            state.make_ready(w);
            true
        }
        _ => false,
    };
    drop(state);

    if woke {
        shared.work_cond.notify_one();
    }
    shared.done_cond.notify_all();

    // Stack unmapped outside the lock
    drop(fiber);
}

fn sleep_until(deadline: Instant) {
    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep(deadline - now);
    }
}

// ============================================================================
// Cooperative primitives (called from green threads)
// ============================================================================

/// Give up the worker and requeue at the tail
///
/// No-op outside a green thread.
pub fn yield_now() {
    tls::with_worker(|w| {
        if let Some(w) = w.filter(|w| w.current().is_some()) {
            w.suspend(Park::Yield);
        }
    })
}

/// Wait for `thread` to finish
///
/// Returns at once if it already has. Outside a green thread this is a
/// no-op returning `Ok`; use [`Scheduler::wait`] to block an OS thread.
///
/// Only one thread may wait on a given target: a second concurrent joiner
/// gets `JoinConflict` and the first keeps its wakeup.
pub fn join(thread: &Thread) -> SchedResult<()> {
    tls::with_worker(|w| {
        let Some(w) = w else {
            return Ok(());
        };
        let Some(me) = w.current() else {
            return Ok(());
        };
        if !thread.belongs_to(&w.shared) {
            return Err(SchedError::InvalidArgument("thread belongs to another scheduler"));
        }
        let target = thread.id();
        if target == me {
            return Err(SchedError::InvalidArgument("a thread cannot join itself"));
        }

        let reservation = w.shared.lock().threads.reserve_waiter(target, me);
        match reservation {
            Reservation::Finished => Ok(()),
            Reservation::Conflict => {
                kwarn!("thread {} already has a waiter; join rejected", target);
                Err(SchedError::JoinConflict(target))
            }
            Reservation::Recorded => {
                w.suspend(Park::Join(target));
                Ok(())
            }
        }
    })
}

/// Suspend for at least `duration`
///
/// Inside a green thread the hosting worker is held for the whole sleep;
/// other workers keep running. Outside a green thread this is
/// `std::thread::sleep`.
pub fn sleep(duration: Duration) {
    let parked = tls::with_worker(|w| match w.filter(|w| w.current().is_some()) {
        Some(w) => {
            w.suspend(Park::Sleep(deadline_after(Instant::now(), duration)));
            true
        }
        None => false,
    });
    if !parked {
        thread::sleep(duration);
    }
}

/// Longest sleep a deadline is clamped to
const MAX_SLEEP: Duration = Duration::from_secs(u32::MAX as u64);

/// `now + duration`, clamped so it cannot overflow `Instant`
fn deadline_after(now: Instant, duration: Duration) -> Instant {
    now.checked_add(duration)
        .or_else(|| now.checked_add(MAX_SLEEP))
        .unwrap_or(now)
}

/// [`sleep`] for `ms` milliseconds
pub fn sleep_ms(ms: u64) {
    sleep(Duration::from_millis(ms))
}

/// Handle to the calling green thread, or `None` outside one
pub fn current() -> Option<Thread> {
    tls::with_worker(|w| {
        let w = w?;
        w.current().map(|id| Thread::new(id, &w.shared))
    })
}

/// Spawn a sibling green thread on the calling thread's scheduler
///
/// Fails with `InvalidArgument` outside a green thread.
pub fn spawn<F>(f: F) -> SchedResult<Thread>
where
    F: FnOnce() + Send + 'static,
{
    tls::with_worker(move |w| match w.filter(|w| w.current().is_some()) {
        Some(w) => spawn_on(&w.shared, w.shared.config.stack_size, f),
        None => Err(SchedError::InvalidArgument(
            "spawn outside a green thread needs a Scheduler",
        )),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    fn log() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn push(log: &Arc<Mutex<Vec<String>>>, s: impl Into<String>) {
        log.lock().unwrap().push(s.into());
    }

    fn one_worker() -> Scheduler {
        Scheduler::with_config(SchedulerConfig::new().num_workers(1)).unwrap()
    }

    #[test]
    fn test_create_bounds() {
        for bad in [0i64, -1, (MAX_WORKERS + 1) as i64] {
            assert!(
                matches!(Scheduler::create(bad), Err(SchedError::InvalidArgument(_))),
                "{}",
                bad
            );
        }
        let s = Scheduler::create(1).unwrap();
        assert_eq!(s.num_workers(), 1);
        assert!(!s.is_running());
        assert!(Scheduler::create(MAX_WORKERS).is_ok());
    }

    #[test]
    fn test_start_stop_idempotent() {
        let mut s = Scheduler::create(2).unwrap();
        s.stop();
        s.start().unwrap();
        s.start().unwrap();
        assert!(s.is_running());
        s.stop();
        s.stop();
        assert!(!s.is_running());
        s.destroy();
    }

    #[test]
    fn test_fifo_dispatch_single_worker() {
        let mut s = one_worker();
        let out = log();
        let mut handles = Vec::new();
        for name in ["A", "B", "C"] {
            let out = out.clone();
            handles.push(s.spawn(move || push(&out, name)).unwrap());
        }
        assert_eq!(s.ready_len(), 3);
        assert_eq!(s.state_of(&handles[0]), Some(ThreadState::Ready));

        s.start().unwrap();
        for h in &handles {
            s.wait(h).unwrap();
        }
        assert_eq!(*out.lock().unwrap(), vec!["A", "B", "C"]);
        assert_eq!(s.live_threads(), 0);
    }

    #[test]
    fn test_join_finished_does_not_suspend() {
        let mut s = one_worker();
        let out = log();

        let o = out.clone();
        let target = s.spawn(move || push(&o, "T")).unwrap();
        let o = out.clone();
        let t = target.clone();
        let joiner = s
            .spawn(move || {
                join(&t).unwrap();
                join(&t).unwrap();
                push(&o, "J");
            })
            .unwrap();
        let o = out.clone();
        let other = s.spawn(move || push(&o, "X")).unwrap();

        s.start().unwrap();
        s.wait(&joiner).unwrap();
        s.wait(&other).unwrap();
        assert_eq!(*out.lock().unwrap(), vec!["T", "J", "X"]);
    }

    #[test]
    fn test_join_wakes_once_after_target_finishes() {
        let mut s = one_worker();
        let out = log();

        let o = out.clone();
        let target = s
            .spawn(move || {
                for i in 0..3 {
                    push(&o, format!("T{}", i));
                    yield_now();
                }
            })
            .unwrap();

        let o = out.clone();
        let t = target.clone();
        let saw_finished = Arc::new(AtomicBool::new(false));
        let seen = saw_finished.clone();
        let joiner = s
            .spawn(move || {
                join(&t).unwrap();
                seen.store(t.is_finished(), Ordering::SeqCst);
                push(&o, "J");
            })
            .unwrap();

        s.start().unwrap();
        s.wait(&joiner).unwrap();
        assert!(saw_finished.load(Ordering::SeqCst));
        assert_eq!(*out.lock().unwrap(), vec!["T0", "T1", "T2", "J"]);
    }

    #[test]
    fn test_second_joiner_rejected() {
        let mut s = one_worker();
        let target = s
            .spawn(|| {
                for _ in 0..5 {
                    yield_now();
                }
            })
            .unwrap();

        let first = Arc::new(Mutex::new(None));
        let second = Arc::new(Mutex::new(None));
        let (t, r) = (target.clone(), first.clone());
        let j1 = s.spawn(move || *r.lock().unwrap() = Some(join(&t))).unwrap();
        let (t, r) = (target.clone(), second.clone());
        let j2 = s.spawn(move || *r.lock().unwrap() = Some(join(&t))).unwrap();

        s.start().unwrap();
        s.wait(&j1).unwrap();
        s.wait(&j2).unwrap();
        assert_eq!(*first.lock().unwrap(), Some(Ok(())));
        assert_eq!(
            *second.lock().unwrap(),
            Some(Err(SchedError::JoinConflict(target.id())))
        );
    }

    #[test]
    fn test_yield_preserves_locals_across_workers() {
        let mut s = Scheduler::create(3).unwrap();
        let ok = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for seed in 0..6usize {
            let ok = ok.clone();
            handles.push(
                s.spawn(move || {
                    let mut acc = seed;
                    let label = format!("thread-{}", seed);
                    for i in 0..100 {
                        acc = acc.wrapping_mul(31).wrapping_add(i);
                        yield_now();
                    }
                    let mut expect = seed;
                    for i in 0..100 {
                        expect = expect.wrapping_mul(31).wrapping_add(i);
                    }
                    if acc == expect && label == format!("thread-{}", seed) {
                        ok.fetch_add(1, Ordering::SeqCst);
                    }
                })
                .unwrap(),
            );
        }
        s.start().unwrap();
        for h in &handles {
            s.wait(h).unwrap();
        }
        assert_eq!(ok.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_sleep_lower_bound() {
        let mut s = Scheduler::create(2).unwrap();
        let elapsed = Arc::new(Mutex::new(Duration::ZERO));
        let e = elapsed.clone();
        let h = s
            .spawn(move || {
                let t0 = Instant::now();
                sleep_ms(50);
                *e.lock().unwrap() = t0.elapsed();
            })
            .unwrap();
        s.start().unwrap();
        s.wait(&h).unwrap();
        assert!(*elapsed.lock().unwrap() >= Duration::from_millis(50));
    }

    #[test]
    fn test_restart_after_stop() {
        let mut s = Scheduler::create(2).unwrap();
        s.start().unwrap();
        let h = s.spawn(|| yield_now()).unwrap();
        s.wait(&h).unwrap();
        s.stop();
        assert!(!s.is_running());

        let ran = Arc::new(AtomicBool::new(false));
        let r = ran.clone();
        let h = s.spawn(move || r.store(true, Ordering::SeqCst)).unwrap();
        assert!(s.wait(&h).is_err());

        s.start().unwrap();
        s.wait(&h).unwrap();
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_stop_drains_ready_queue() {
        let mut s = Scheduler::create(2).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            let c = count.clone();
            s.spawn(move || {
                yield_now();
                c.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        s.start().unwrap();
        s.stop();
        assert_eq!(count.load(Ordering::SeqCst), 20);
        assert_eq!(s.ready_len(), 0);
    }

    #[test]
    fn test_primitives_outside_green_thread() {
        assert!(current().is_none());
        yield_now();
        sleep_ms(1);
        assert!(matches!(spawn(|| {}), Err(SchedError::InvalidArgument(_))));

        let s = Scheduler::create(1).unwrap();
        let h = s.spawn(|| {}).unwrap();
        assert_eq!(join(&h), Ok(()));
        assert_eq!(s.state_of(&h), Some(ThreadState::Ready));
    }

    #[test]
    fn test_current_and_self_join() {
        let mut s = Scheduler::create(1).unwrap();
        let seen = Arc::new(Mutex::new(None));
        let r = seen.clone();
        let h = s
            .spawn(move || {
                let me = current().expect("inside a green thread");
                *r.lock().unwrap() = Some((me.id(), join(&me)));
            })
            .unwrap();
        s.start().unwrap();
        s.wait(&h).unwrap();

        let (id, result) = seen.lock().unwrap().take().unwrap();
        assert_eq!(id, h.id());
        assert!(matches!(result, Err(SchedError::InvalidArgument(_))));
    }

    #[test]
    fn test_spawn_from_green_thread() {
        let mut s = Scheduler::create(2).unwrap();
        let child_ran = Arc::new(AtomicBool::new(false));
        let c = child_ran.clone();
        let h = s
            .spawn(move || {
                let child = spawn(move || c.store(true, Ordering::SeqCst)).unwrap();
                join(&child).unwrap();
            })
            .unwrap();
        s.start().unwrap();
        s.wait(&h).unwrap();
        assert!(child_ran.load(Ordering::SeqCst));
    }

    #[test]
    fn test_panic_still_wakes_waiter() {
        let mut s = one_worker();
        // Room for the panic hook's formatting
        let target = s
            .spawn_with_stack(256 * 1024, || panic!("green thread failure"))
            .unwrap();
        let t = target.clone();
        let joined = Arc::new(AtomicBool::new(false));
        let j = joined.clone();
        let joiner = s
            .spawn(move || {
                join(&t).unwrap();
                j.store(true, Ordering::SeqCst);
            })
            .unwrap();
        s.start().unwrap();
        s.wait(&joiner).unwrap();
        assert!(joined.load(Ordering::SeqCst));
        assert_eq!(s.state_of(&target), Some(ThreadState::Finished));
    }

    #[test]
    fn test_stack_size_arguments() {
        let s = Scheduler::create(1).unwrap();
        assert!(matches!(
            s.spawn_with_stack(0, || {}),
            Err(SchedError::InvalidArgument(_))
        ));
        assert_eq!(
            s.spawn_with_stack(512, || {}).unwrap_err(),
            SchedError::ContextFailure
        );
        assert!(s.spawn_with_stack(256 * 1024, || {}).is_ok());
    }

    #[test]
    fn test_foreign_handles_rejected() {
        let a = Scheduler::create(1).unwrap();
        let b = Scheduler::create(1).unwrap();
        let h = a.spawn(|| {}).unwrap();
        assert!(b.wait(&h).is_err());
        assert_eq!(b.state_of(&h), None);
        assert_eq!(a.state_of(&h), Some(ThreadState::Ready));
    }

    #[test]
    fn test_end_to_end_two_workers_five_threads() {
        let mut s = Scheduler::create(2).unwrap();
        s.start().unwrap();

        let done = Arc::new(AtomicUsize::new(0));
        let mut threads = Vec::new();
        for id in 1..=5u64 {
            let done = done.clone();
            threads.push(
                s.spawn(move || {
                    for i in 0..5u64 {
                        lwthread_core::kdebug!("thread {} iteration {}", id, i);
                        sleep_ms(id * (i + 1));
                        yield_now();
                    }
                    done.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap(),
            );
        }

        let all_done_before_return = Arc::new(AtomicBool::new(false));
        let flag = all_done_before_return.clone();
        let d = done.clone();
        let joiner = s
            .spawn(move || {
                for t in &threads {
                    join(t).unwrap();
                }
                flag.store(d.load(Ordering::SeqCst) == 5, Ordering::SeqCst);
            })
            .unwrap();

        s.wait(&joiner).unwrap();
        assert!(all_done_before_return.load(Ordering::SeqCst));
        s.stop();
        s.destroy();
    }

    fn wait_for(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !done() {
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
        true
    }

    #[test]
    fn test_destroy_from_own_green_thread_releases_workers() {
        let s = Scheduler::create(3).unwrap();
        let shared = Arc::downgrade(&s.shared);

        let holder = Arc::new(Mutex::new(None::<Scheduler>));
        let h = holder.clone();
        let t = s
            .spawn(move || {
                let sched = h.lock().unwrap().take();
                if let Some(sched) = sched {
                    sched.destroy();
                }
                yield_now();
            })
            .unwrap();
        *holder.lock().unwrap() = Some(s);
        holder.lock().unwrap().as_mut().unwrap().start().unwrap();

        // Every worker exits and drops its reference to the scheduler.
        assert!(wait_for(|| shared.strong_count() == 0));
        assert!(holder.lock().unwrap().is_none());
        assert_eq!(t.state(), None);
    }

    #[test]
    fn test_restart_after_stop_from_own_green_thread() {
        let s = Scheduler::create(2).unwrap();
        let holder = Arc::new(Mutex::new(None::<Scheduler>));
        let restart = Arc::new(Mutex::new(None));

        let (h, r) = (holder.clone(), restart.clone());
        let t = s
            .spawn(move || {
                let sched = h.lock().unwrap().take();
                if let Some(mut sched) = sched {
                    sched.stop();
                    assert!(!sched.is_running());
                    *r.lock().unwrap() = Some(sched.start());
                    *h.lock().unwrap() = Some(sched);
                }
            })
            .unwrap();
        *holder.lock().unwrap() = Some(s);
        holder.lock().unwrap().as_mut().unwrap().start().unwrap();

        assert!(wait_for(|| t.is_finished() && holder.lock().unwrap().is_some()));
        assert!(matches!(
            *restart.lock().unwrap(),
            Some(Err(SchedError::InvalidArgument(_)))
        ));

        let mut s = holder.lock().unwrap().take().unwrap();
        assert!(!s.is_running());
        s.start().unwrap();
        let h = s.spawn(yield_now).unwrap();
        s.wait(&h).unwrap();
        s.destroy();
    }

    #[test]
    fn test_join_handoff_many_workers() {
        const PAIRS: usize = 100;
        let mut s = Scheduler::create(4).unwrap();
        s.start().unwrap();

        for round in 0..10 {
            let joined = Arc::new(AtomicUsize::new(0));
            let mut joiners = Vec::with_capacity(PAIRS);
            for i in 0..PAIRS {
                let yields = (i + round) % 3;
                let target = s
                    .spawn(move || {
                        for _ in 0..yields {
                            yield_now();
                        }
                    })
                    .unwrap();
                let j = joined.clone();
                joiners.push(
                    s.spawn(move || {
                        join(&target).unwrap();
                        if target.is_finished() {
                            j.fetch_add(1, Ordering::SeqCst);
                        }
                    })
                    .unwrap(),
                );
            }
            for j in &joiners {
                s.wait(j).unwrap();
            }
            assert_eq!(joined.load(Ordering::SeqCst), PAIRS, "round {}", round);
            assert_eq!(s.live_threads(), 0);
        }
        s.destroy();
    }

    #[test]
    fn test_sleep_deadline_clamped() {
        let now = Instant::now();
        assert_eq!(
            deadline_after(now, Duration::from_millis(5)),
            now + Duration::from_millis(5)
        );
        let far = deadline_after(now, Duration::MAX);
        assert!(far > now + Duration::from_secs(86_400));
    }
}

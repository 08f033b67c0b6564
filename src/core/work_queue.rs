//! Serial and concurrent work queues backed by a self-sizing thread set.
//!
//! A [`WorkQueue`] holds pending [`WorkItem`]s in a ring buffer and owns the
//! worker threads that drain it. Concurrent queues grow their width with the
//! outstanding work (bounded by priority and hardware), serial queues pin it
//! to one, and the main queue has no threads at all: its items run only when
//! the owning thread calls [`WorkQueue::drain`].
//!
//! # Ordering
//!
//! - FIFO dequeue per queue.
//! - A barrier starts only after every item submitted before it finished,
//!   runs alone, and every item submitted after it waits for it.
//!
//! # Example
//!
//! ```
//! use workqueue::core::{Priority, QueueMode, WorkQueue};
//!
//! let queue = WorkQueue::new(Priority::Default, QueueMode::Concurrent, "example");
//!
//! queue.perform(|| println!("fire and forget")).unwrap();
//! let answer = queue.perform_with_future(|| 6 * 7).unwrap();
//! assert_eq!(answer.get(), Ok(42));
//!
//! let seen = queue.perform_synchronous_barrier(|| "exclusive").unwrap();
//! assert_eq!(seen, "exclusive");
//!
//! queue.shutdown(Default::default());
//! ```

mod width;
mod worker;

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::mem;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::WorkQueueConfig;
use crate::core::error::{panic_message, WorkQueueError};
use crate::core::future::{packaged, Outcome, WorkFuture};
use crate::core::policy::{Priority, QueueKind, QueueMode, TeardownMode};
use crate::core::registry;
use crate::core::work_item::WorkItem;
use crate::sync::Condition;

thread_local! {
    static CURRENT: RefCell<Option<WorkQueue>> = const { RefCell::new(None) };
}

/// Marks the calling thread as serving `queue` until dropped.
struct CurrentGuard {
    previous: Option<WorkQueue>,
}

impl CurrentGuard {
    fn enter(queue: &WorkQueue) -> Self {
        let previous = CURRENT.with(|current| current.replace(Some(queue.clone())));
        Self { previous }
    }
}

impl Drop for CurrentGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        let _ = CURRENT.try_with(|current| current.replace(previous));
    }
}

/// Lock-free view of the queue counters. Mutated only under the dispatch lock.
#[derive(Debug, Default)]
struct Counters {
    open: AtomicUsize,
    running: AtomicUsize,
    sleeping: AtomicUsize,
    suspended: AtomicUsize,
    completed: AtomicU64,
    panicked: AtomicU64,
}

/// State guarded by the dispatch lock.
struct DispatchState {
    pending: VecDeque<WorkItem>,
    workers: HashMap<usize, JoinHandle<()>>,
    retired: Vec<JoinHandle<()>>,
    threads: usize,
    next_worker_id: usize,
    width: usize,
    shutting_down: bool,
    /// Workers of this queue blocked in a nested synchronous call.
    nested_waiters: usize,
}

struct Shared {
    identifier: String,
    priority: Priority,
    kind: QueueKind,
    config: WorkQueueConfig,
    max_width: usize,
    owner: Option<ThreadId>,
    state: Mutex<DispatchState>,
    counters: Counters,
    barrier_active: AtomicBool,
    idle: Condition,
    barrier: Condition,
}

/// Point-in-time statistics for a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Queue identifier.
    pub identifier: String,
    /// Scheduling class.
    pub priority: Priority,
    /// Execution mode (`Serial` for the main queue).
    pub mode: QueueMode,
    /// Whether this is the thread-less main queue.
    pub main: bool,
    /// Current target width.
    pub width: usize,
    /// Upper bound the width can reach.
    pub max_width: usize,
    /// Live worker threads.
    pub threads: usize,
    /// Items waiting to be dequeued.
    pub open: usize,
    /// Items executing.
    pub running: usize,
    /// Workers parked waiting for work.
    pub sleeping: usize,
    /// Suspension depth.
    pub suspended: usize,
    /// Whether a barrier item holds the queue.
    pub barrier_active: bool,
    /// Items that ran to completion (panicking items included).
    pub completed: u64,
    /// Fire-and-forget items that panicked.
    pub panicked: u64,
}

/// Shared handle to a work queue.
///
/// Cloning is cheap and every clone drives the same queue. Worker threads
/// retire on their own after [`WorkQueueConfig::idle_timeout`], so a queue that
/// is simply dropped releases its threads once idle; [`shutdown`](Self::shutdown)
/// is the deterministic teardown that also joins them.
#[derive(Clone)]
pub struct WorkQueue {
    shared: Arc<Shared>,
}

impl WorkQueue {
    /// Creates a queue with default tuning.
    pub fn new(priority: Priority, mode: QueueMode, identifier: impl Into<String>) -> Self {
        Self::build(
            priority,
            QueueKind::Threaded(mode),
            identifier.into(),
            WorkQueueConfig::default(),
        )
    }

    /// Creates a queue with explicit tuning.
    ///
    /// # Errors
    ///
    /// [`WorkQueueError::InvalidConfig`] if `config` does not validate.
    pub fn with_config(
        priority: Priority,
        mode: QueueMode,
        identifier: impl Into<String>,
        config: WorkQueueConfig,
    ) -> Result<Self, WorkQueueError> {
        config.validate().map_err(WorkQueueError::InvalidConfig)?;
        Ok(Self::build(
            priority,
            QueueKind::Threaded(mode),
            identifier.into(),
            config,
        ))
    }

    /// Creates a thread-less queue drained by the calling thread.
    pub(crate) fn new_main(identifier: impl Into<String>, config: WorkQueueConfig) -> Self {
        Self::build(Priority::High, QueueKind::Main, identifier.into(), config)
    }

    /// Creates one of the registry's concurrent global queues.
    pub(crate) fn new_global(priority: Priority, identifier: String, config: WorkQueueConfig) -> Self {
        Self::build(
            priority,
            QueueKind::Threaded(QueueMode::Concurrent),
            identifier,
            config,
        )
    }

    fn build(priority: Priority, kind: QueueKind, identifier: String, config: WorkQueueConfig) -> Self {
        let max_width = width::max_width(kind, priority, &config);
        let owner = matches!(kind, QueueKind::Main).then(|| thread::current().id());
        debug!(queue = %identifier, ?priority, ?kind, max_width, "work queue created");

        Self {
            shared: Arc::new(Shared {
                identifier,
                priority,
                kind,
                config,
                max_width,
                owner,
                state: Mutex::new(DispatchState {
                    pending: VecDeque::new(),
                    workers: HashMap::new(),
                    retired: Vec::new(),
                    threads: 0,
                    next_worker_id: 0,
                    width: 1,
                    shutting_down: false,
                    nested_waiters: 0,
                }),
                counters: Counters::default(),
                barrier_active: AtomicBool::new(false),
                idle: Condition::new(),
                barrier: Condition::new(),
            }),
        }
    }

    /// The application's main queue.
    ///
    /// # Errors
    ///
    /// [`WorkQueueError::NotInitialized`] before [`registry::initialize`].
    pub fn main_queue() -> Result<Self, WorkQueueError> {
        registry::main_queue()
    }

    /// The shared concurrent queue for `priority`.
    ///
    /// # Errors
    ///
    /// [`WorkQueueError::NotInitialized`] before [`registry::initialize`].
    pub fn global_queue(priority: Priority) -> Result<Self, WorkQueueError> {
        registry::global_queue(priority)
    }

    /// The queue whose items the calling thread is currently executing, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        CURRENT.try_with(|current| current.borrow().clone()).ok().flatten()
    }

    /// Queue identifier.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.shared.identifier
    }

    /// Scheduling class.
    #[must_use]
    pub fn priority(&self) -> Priority {
        self.shared.priority
    }

    /// Execution mode; the main queue reports `Serial`.
    #[must_use]
    pub fn mode(&self) -> QueueMode {
        match self.shared.kind {
            QueueKind::Threaded(mode) => mode,
            QueueKind::Main => QueueMode::Serial,
        }
    }

    /// Whether this is the thread-less main queue.
    #[must_use]
    pub fn is_main(&self) -> bool {
        self.shared.kind == QueueKind::Main
    }

    /// Upper bound on simultaneously running items.
    #[must_use]
    pub fn max_width(&self) -> usize {
        self.shared.max_width
    }

    /// Whether both handles drive the same queue.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shared.state.lock().shutting_down
    }

    /// Enqueues `task` and returns immediately.
    ///
    /// A panic inside `task` is logged and counted; it never reaches the caller
    /// and never takes down the worker.
    ///
    /// # Errors
    ///
    /// - [`WorkQueueError::ShutDown`] after [`shutdown`](Self::shutdown)
    /// - [`WorkQueueError::Spawn`] if the queue has no thread and none could be started
    pub fn perform<F>(&self, task: F) -> Result<(), WorkQueueError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(WorkItem::new(task))
    }

    /// Enqueues `task` as a barrier: it starts once everything submitted
    /// earlier has finished, runs alone, and holds back everything submitted
    /// later until it returns.
    ///
    /// # Errors
    ///
    /// Same as [`perform`](Self::perform).
    pub fn perform_barrier<F>(&self, task: F) -> Result<(), WorkQueueError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(WorkItem::barrier(task))
    }

    /// Enqueues a prebuilt [`WorkItem`], barrier or not.
    ///
    /// # Errors
    ///
    /// Same as [`perform`](Self::perform).
    pub fn perform_item(&self, item: WorkItem) -> Result<(), WorkQueueError> {
        self.submit(item)
    }

    /// Runs `task` on the queue and blocks until it has finished, returning its
    /// value. A panic in `task` resumes on the calling thread.
    ///
    /// # Errors
    ///
    /// - [`WorkQueueError::RecursiveSynchronous`] when called from a thread
    ///   serving this queue and the nested item could never run: the queue
    ///   is serial, it is the main queue on its owner thread, or every other
    ///   slot of a concurrent queue is already held by a blocked nested caller
    /// - [`WorkQueueError::ShutDown`] if the queue is shut down before or
    ///   while the item is pending
    pub fn perform_synchronous<F, T>(&self, task: F) -> Result<T, WorkQueueError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.synchronous(task, false)
    }

    /// [`perform_synchronous`](Self::perform_synchronous) with barrier semantics.
    ///
    /// # Errors
    ///
    /// Same as [`perform_synchronous`](Self::perform_synchronous), except that
    /// any call from a thread serving this queue is refused: the barrier
    /// would wait for the caller's own item to finish.
    pub fn perform_synchronous_barrier<F, T>(&self, task: F) -> Result<T, WorkQueueError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.synchronous(task, true)
    }

    /// Enqueues `task` and returns a handle to its result.
    ///
    /// # Errors
    ///
    /// Same as [`perform`](Self::perform).
    pub fn perform_with_future<F, T>(&self, task: F) -> Result<WorkFuture<T>, WorkQueueError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (packaged, future) = packaged(task);
        self.perform(packaged)?;
        Ok(future)
    }

    /// [`perform_with_future`](Self::perform_with_future) with barrier semantics.
    ///
    /// # Errors
    ///
    /// Same as [`perform`](Self::perform).
    pub fn perform_barrier_with_future<F, T>(&self, task: F) -> Result<WorkFuture<T>, WorkQueueError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (packaged, future) = packaged(task);
        self.perform_barrier(packaged)?;
        Ok(future)
    }

    /// Stops dequeuing new items. Nestable; items already running are unaffected.
    pub fn suspend(&self) {
        let _state = self.shared.state.lock();
        let depth = self.shared.counters.suspended.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(queue = %self.shared.identifier, depth, "queue suspended");
    }

    /// Undoes one [`suspend`](Self::suspend); dispatch restarts when the depth
    /// reaches zero.
    pub fn resume(&self) {
        let reaped = {
            let mut state = self.shared.state.lock();
            let depth = self.shared.counters.suspended.load(Ordering::Relaxed);
            if depth == 0 {
                warn!(queue = %self.shared.identifier, "resume without matching suspend");
                return;
            }
            self.shared.counters.suspended.store(depth - 1, Ordering::Relaxed);
            debug!(queue = %self.shared.identifier, depth = depth - 1, "queue resumed");
            if depth > 1 {
                return;
            }
            worker::provision(self, &mut state);
            mem::take(&mut state.retired)
        };

        self.shared.idle.notify_all();
        worker::join_all(reaped);
    }

    /// Tears the queue down and joins its workers.
    ///
    /// [`TeardownMode::Drain`] lifts any suspension and runs every pending
    /// item first; [`TeardownMode::Discard`] drops pending items (their futures
    /// resolve to [`TaskError::Abandoned`](super::TaskError::Abandoned)).
    /// Later submissions fail with [`WorkQueueError::ShutDown`]. Idempotent.
    ///
    /// The main queue can only drain on its owning thread; elsewhere its
    /// pending items are discarded. Called from one of the queue's own
    /// workers, the queue is signalled but no thread is joined.
    pub fn shutdown(&self, mode: TeardownMode) {
        let shared = &self.shared;
        let on_own_thread = self.is_served_by_current_thread();
        let mode = if shared.kind == QueueKind::Main && !on_own_thread && mode == TeardownMode::Drain {
            warn!(queue = %shared.identifier, "main queue torn down off its owner thread, discarding pending items");
            TeardownMode::Discard
        } else {
            mode
        };

        let discarded = {
            let mut state = shared.state.lock();
            if state.shutting_down {
                return;
            }
            state.shutting_down = true;

            let discarded = match mode {
                TeardownMode::Discard => {
                    shared.counters.open.store(0, Ordering::Relaxed);
                    mem::take(&mut state.pending)
                }
                TeardownMode::Drain => {
                    shared.counters.suspended.store(0, Ordering::Relaxed);
                    VecDeque::new()
                }
            };
            worker::provision(self, &mut state);
            discarded
        };

        if !discarded.is_empty() {
            debug!(queue = %shared.identifier, discarded = discarded.len(), "pending items discarded");
        }
        drop(discarded);

        shared.idle.notify_all();
        shared.barrier.notify_all();

        if shared.kind == QueueKind::Main && on_own_thread && mode == TeardownMode::Drain {
            let ran = self.run_pending();
            debug!(queue = %shared.identifier, ran, "main queue drained during teardown");
        }

        if on_own_thread {
            info!(queue = %shared.identifier, "work queue shut down from its own thread");
            return;
        }

        loop {
            let handles: Vec<JoinHandle<()>> = {
                let mut state = shared.state.lock();
                let mut handles: Vec<_> = state.workers.drain().map(|(_, handle)| handle).collect();
                handles.append(&mut state.retired);
                handles
            };
            if handles.is_empty() {
                break;
            }
            worker::join_all(handles);
        }

        info!(queue = %shared.identifier, ?mode, "work queue shut down");
    }

    /// Runs every dispatchable item of the main queue on the calling thread.
    /// Returns how many items ran.
    ///
    /// # Errors
    ///
    /// - [`WorkQueueError::NotMainQueue`] on a threaded queue
    /// - [`WorkQueueError::WrongThread`] off the owning thread
    pub fn drain(&self) -> Result<usize, WorkQueueError> {
        self.check_main_owner()?;
        Ok(self.run_pending())
    }

    /// Waits up to `timeout` for main-queue work to become dispatchable, then
    /// [`drain`](Self::drain)s.
    ///
    /// # Errors
    ///
    /// Same as [`drain`](Self::drain).
    pub fn drain_for(&self, timeout: Duration) -> Result<usize, WorkQueueError> {
        self.check_main_owner()?;
        {
            let shared = &self.shared;
            let state = shared.state.lock();
            shared.counters.sleeping.fetch_add(1, Ordering::Relaxed);
            let (_state, _ready) = shared.idle.wait_for_with(state, timeout, |state| {
                state.shutting_down || shared.can_dispatch(state)
            });
            shared.counters.sleeping.fetch_sub(1, Ordering::Relaxed);
        }
        Ok(self.run_pending())
    }

    /// Snapshot of the queue counters.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let shared = &self.shared;
        let state = shared.state.lock();
        let counters = &shared.counters;
        QueueStats {
            identifier: shared.identifier.clone(),
            priority: shared.priority,
            mode: self.mode(),
            main: self.is_main(),
            width: state.width,
            max_width: shared.max_width,
            threads: state.threads,
            open: counters.open.load(Ordering::Relaxed),
            running: counters.running.load(Ordering::Relaxed),
            sleeping: counters.sleeping.load(Ordering::Relaxed),
            suspended: counters.suspended.load(Ordering::Relaxed),
            barrier_active: shared.barrier_active.load(Ordering::Acquire),
            completed: counters.completed.load(Ordering::Relaxed),
            panicked: counters.panicked.load(Ordering::Relaxed),
        }
    }

    fn submit(&self, item: WorkItem) -> Result<(), WorkQueueError> {
        let shared = &self.shared;
        let (wake, reaped) = {
            let mut state = shared.state.lock();
            if state.shutting_down {
                warn!(queue = %shared.identifier, "submission rejected after shutdown");
                return Err(WorkQueueError::ShutDown {
                    queue: shared.identifier.clone(),
                });
            }

            state.pending.push_back(item);
            shared.counters.open.fetch_add(1, Ordering::Relaxed);
            shared.recalculate_width(&mut state);

            let wake = match shared.kind {
                QueueKind::Main => true,
                QueueKind::Threaded(_) => match worker::wake_or_spawn(self, &mut state) {
                    Ok(wake) => wake,
                    Err(err) => {
                        state.pending.pop_back();
                        shared.counters.open.fetch_sub(1, Ordering::Relaxed);
                        shared.recalculate_width(&mut state);
                        return Err(err);
                    }
                },
            };
            (wake, mem::take(&mut state.retired))
        };

        if wake {
            shared.idle.notify_one();
        }
        worker::join_all(reaped);
        Ok(())
    }

    fn synchronous<F, T>(&self, task: F, barrier: bool) -> Result<T, WorkQueueError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let nested = self.is_served_by_current_thread();
        if nested && !self.admit_nested(barrier) {
            error!(
                queue = %self.shared.identifier,
                barrier,
                "synchronous submission from the queue's own thread refused"
            );
            return Err(WorkQueueError::RecursiveSynchronous {
                queue: self.shared.identifier.clone(),
            });
        }

        let (packaged, future) = packaged(task);
        let item = if barrier {
            WorkItem::barrier(packaged)
        } else {
            WorkItem::new(packaged)
        };
        let outcome = self.submit(item).map(|()| future.wait_outcome());
        if nested {
            self.shared.state.lock().nested_waiters -= 1;
        }

        match outcome? {
            Outcome::Value(value) => Ok(value),
            Outcome::Panicked(payload) => resume_unwind(payload),
            Outcome::Abandoned => Err(WorkQueueError::ShutDown {
                queue: self.shared.identifier.clone(),
            }),
        }
    }

    /// Reserves a nested synchronous slot for a worker of this queue.
    ///
    /// Admitted only on a concurrent queue, never for a barrier, and only
    /// while at least one slot stays free of blocked nested callers, so the
    /// nested item can always be dispatched eventually.
    fn admit_nested(&self, barrier: bool) -> bool {
        if barrier || self.shared.kind != QueueKind::Threaded(QueueMode::Concurrent) {
            return false;
        }
        let mut state = self.shared.state.lock();
        if state.nested_waiters + 1 >= self.shared.max_width {
            return false;
        }
        state.nested_waiters += 1;
        true
    }

    fn is_served_by_current_thread(&self) -> bool {
        if self.shared.owner == Some(thread::current().id()) {
            return true;
        }
        Self::current().is_some_and(|current| current.ptr_eq(self))
    }

    fn check_main_owner(&self) -> Result<(), WorkQueueError> {
        match self.shared.owner {
            None => Err(WorkQueueError::NotMainQueue {
                queue: self.shared.identifier.clone(),
            }),
            Some(owner) if owner != thread::current().id() => Err(WorkQueueError::WrongThread {
                queue: self.shared.identifier.clone(),
            }),
            Some(_) => Ok(()),
        }
    }

    /// Main-queue pump: dequeue and run on the calling thread until nothing
    /// is dispatchable.
    fn run_pending(&self) -> usize {
        let _current = CurrentGuard::enter(self);
        let mut ran = 0;
        loop {
            let item = {
                let mut state = self.shared.state.lock();
                self.shared.try_dequeue(&mut state)
            };
            let Some(item) = item else {
                return ran;
            };
            self.shared.run_item(self, None, item);
            ran += 1;
        }
    }
}

impl PartialEq for WorkQueue {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for WorkQueue {}

impl std::fmt::Debug for WorkQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkQueue")
            .field("identifier", &self.shared.identifier)
            .field("priority", &self.shared.priority)
            .field("kind", &self.shared.kind)
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn recalculate_width(&self, state: &mut DispatchState) {
        state.width = match self.kind {
            QueueKind::Threaded(QueueMode::Concurrent) => {
                let outstanding = self.counters.open.load(Ordering::Relaxed)
                    + self.counters.running.load(Ordering::Relaxed);
                width::target_width(self.max_width, outstanding)
            }
            QueueKind::Threaded(QueueMode::Serial) | QueueKind::Main => 1,
        };
    }

    fn can_dispatch(&self, state: &DispatchState) -> bool {
        !state.pending.is_empty()
            && self.counters.suspended.load(Ordering::Relaxed) == 0
            && !self.barrier_active.load(Ordering::Acquire)
            && self.counters.running.load(Ordering::Relaxed) < state.width
    }

    /// Pops the head item if dispatch is enabled. A barrier head raises the
    /// barrier flag, which holds every other worker back.
    fn try_dequeue(&self, state: &mut DispatchState) -> Option<WorkItem> {
        if !self.can_dispatch(state) {
            return None;
        }
        let item = state.pending.pop_front()?;
        self.counters.open.fetch_sub(1, Ordering::Relaxed);
        self.counters.running.fetch_add(1, Ordering::Relaxed);
        if item.is_barrier() {
            self.barrier_active.store(true, Ordering::Release);
        }
        Some(item)
    }

    /// Executes a dequeued item and performs completion bookkeeping.
    fn run_item(&self, queue: &WorkQueue, worker_id: Option<usize>, item: WorkItem) {
        let barrier = item.is_barrier();
        if barrier {
            // Wait for items dequeued before the barrier to finish.
            let state = self.state.lock();
            let _state = self
                .barrier
                .wait_with(state, |_| self.counters.running.load(Ordering::Relaxed) == 1);
        }

        if let Err(payload) = catch_unwind(AssertUnwindSafe(item.into_task())) {
            self.counters.panicked.fetch_add(1, Ordering::Relaxed);
            error!(
                queue = %self.identifier,
                worker_id,
                barrier,
                panic = %panic_message(payload.as_ref()),
                "work item panicked"
            );
        }

        let (notify_barrier, reaped) = {
            let mut state = self.state.lock();
            self.counters.running.fetch_sub(1, Ordering::Relaxed);
            self.counters.completed.fetch_add(1, Ordering::Relaxed);
            if barrier {
                self.barrier_active.store(false, Ordering::Release);
            }
            self.recalculate_width(&mut state);
            if barrier {
                worker::provision(queue, &mut state);
            }
            (
                barrier || self.barrier_active.load(Ordering::Acquire),
                mem::take(&mut state.retired),
            )
        };

        if notify_barrier {
            self.barrier.notify_all();
        }
        if barrier {
            self.idle.notify_all();
        }
        worker::join_all(reaped);
    }
}

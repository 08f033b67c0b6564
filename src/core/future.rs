//! Blocking result handles for `perform_with_future` submissions.
//!
//! A submission is split into a packaged task (runs on the queue, captures the
//! return value or panic) and a [`WorkFuture`] (held by the caller). Both sides
//! share one slot guarded by a `parking_lot::Mutex`; completion is signalled
//! through a [`Condition`], so a caller that never waits pays no wake cost.

use std::any::Any;
use std::fmt;
use std::mem;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::core::error::TaskError;
use crate::sync::Condition;

/// Raw outcome of a packaged task, panic payload preserved.
pub(crate) enum Outcome<T> {
    Value(T),
    Panicked(Box<dyn Any + Send + 'static>),
    Abandoned,
}

impl<T> Outcome<T> {
    fn into_result(self) -> Result<T, TaskError> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Panicked(payload) => Err(TaskError::from_panic(payload.as_ref())),
            Self::Abandoned => Err(TaskError::Abandoned),
        }
    }
}

enum SlotState<T> {
    Pending,
    Ready(Outcome<T>),
    Taken,
}

struct Slot<T> {
    state: Mutex<SlotState<T>>,
    ready: Condition,
}

/// Producer side. Dropping it unfulfilled resolves the future as abandoned.
struct Promise<T> {
    slot: Option<Arc<Slot<T>>>,
}

impl<T> Promise<T> {
    fn fulfill(mut self, outcome: Outcome<T>) {
        if let Some(slot) = self.slot.take() {
            complete(&slot, outcome);
        }
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            complete(&slot, Outcome::Abandoned);
        }
    }
}

fn complete<T>(slot: &Slot<T>, outcome: Outcome<T>) {
    *slot.state.lock() = SlotState::Ready(outcome);
    slot.ready.notify_all();
}

/// Wraps `f` into a fire-once task and the future observing it.
pub(crate) fn packaged<F, T>(f: F) -> (impl FnOnce() + Send + 'static, WorkFuture<T>)
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let slot = Arc::new(Slot {
        state: Mutex::new(SlotState::Pending),
        ready: Condition::new(),
    });
    let promise = Promise {
        slot: Some(Arc::clone(&slot)),
    };

    let task = move || {
        let outcome = match catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => Outcome::Value(value),
            Err(payload) => Outcome::Panicked(payload),
        };
        promise.fulfill(outcome);
    };

    (task, WorkFuture { slot })
}

/// Handle to the eventual result of a queued callable.
///
/// [`get`](Self::get) blocks until the item has run and yields its return
/// value, or the [`TaskError`] describing why there is none.
pub struct WorkFuture<T> {
    slot: Arc<Slot<T>>,
}

impl<T> WorkFuture<T> {
    /// Whether the result is available without blocking.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(*self.slot.state.lock(), SlotState::Ready(_))
    }

    /// Waits up to `timeout` for the result. Returns whether it is ready.
    #[must_use]
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let guard = self.slot.state.lock();
        let (_guard, ready) = self
            .slot
            .ready
            .wait_for_with(guard, timeout, |state| !matches!(state, SlotState::Pending));
        ready
    }

    /// Blocks until the item has run and returns its result.
    ///
    /// # Errors
    ///
    /// - [`TaskError::Panicked`] if the callable panicked
    /// - [`TaskError::Abandoned`] if the item was discarded before running
    pub fn get(self) -> Result<T, TaskError> {
        self.wait_outcome().into_result()
    }

    /// Like [`get`](Self::get) but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// [`TaskError::Timeout`] if the result was not ready in time, otherwise
    /// the same errors as [`get`](Self::get).
    pub fn get_for(self, timeout: Duration) -> Result<T, TaskError> {
        if !self.wait_for(timeout) {
            return Err(TaskError::Timeout);
        }
        self.get()
    }

    pub(crate) fn wait_outcome(self) -> Outcome<T> {
        let guard = self.slot.state.lock();
        let mut guard = self
            .slot
            .ready
            .wait_with(guard, |state| !matches!(state, SlotState::Pending));
        match mem::replace(&mut *guard, SlotState::Taken) {
            SlotState::Ready(outcome) => outcome,
            SlotState::Pending | SlotState::Taken => Outcome::Abandoned,
        }
    }
}

impl<T> fmt::Debug for WorkFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkFuture")
            .field("ready", &self.is_ready())
            .finish()
    }
}

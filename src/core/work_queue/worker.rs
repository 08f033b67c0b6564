//! Worker threads: lazy spawning, the dispatch loop, and idle retirement.
//!
//! Every worker runs the same loop: under the dispatch lock, wait out an
//! active barrier, otherwise pop the next dispatchable item and run it with
//! the lock released, otherwise park on the idle condition. A worker whose
//! idle wait times out with nothing dispatchable retires and leaves its join
//! handle for the next submission (or shutdown) to reap.

use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, warn};

use super::{CurrentGuard, DispatchState, WorkQueue};
use crate::core::error::WorkQueueError;
use crate::core::policy::QueueKind;

/// Routes a fresh submission to a worker.
///
/// Returns `true` when an idle worker should be notified once the dispatch
/// lock is released. Fails only if the queue has no thread at all and a new
/// one could not be started.
pub(super) fn wake_or_spawn(queue: &WorkQueue, state: &mut DispatchState) -> Result<bool, WorkQueueError> {
    if queue.shared.counters.sleeping.load(Ordering::Relaxed) > 0 {
        return Ok(true);
    }
    if state.threads < state.width {
        if let Err(err) = spawn(queue, state) {
            if state.threads == 0 {
                return Err(err);
            }
        }
    }
    Ok(false)
}

/// Starts workers until every outstanding item within the width has one.
/// Spawn failures are logged; existing workers keep draining.
pub(super) fn provision(queue: &WorkQueue, state: &mut DispatchState) {
    let shared = &queue.shared;
    if shared.kind == QueueKind::Main {
        return;
    }

    let outstanding = shared.counters.open.load(Ordering::Relaxed)
        + shared.counters.running.load(Ordering::Relaxed);
    let wanted = state.width.min(outstanding);
    while state.threads < wanted {
        if spawn(queue, state).is_err() {
            break;
        }
    }
}

/// Joins threads that have already left their dispatch loop.
pub(super) fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        let name = handle.thread().name().map(str::to_owned);
        if handle.join().is_err() {
            warn!(worker = ?name, "worker thread panicked outside a work item");
        }
    }
}

fn spawn(queue: &WorkQueue, state: &mut DispatchState) -> Result<(), WorkQueueError> {
    let shared = &queue.shared;
    let worker_id = state.next_worker_id;
    state.next_worker_id += 1;

    let mut builder = thread::Builder::new().name(format!(
        "{}-{}-{worker_id}",
        shared.config.thread_name_prefix, shared.identifier
    ));
    if let Some(size) = shared.config.thread_stack_size {
        builder = builder.stack_size(size);
    }

    let worker_queue = queue.clone();
    match builder.spawn(move || run(&worker_queue, worker_id)) {
        Ok(handle) => {
            state.workers.insert(worker_id, handle);
            state.threads += 1;
            debug!(
                queue = %shared.identifier,
                worker_id,
                threads = state.threads,
                width = state.width,
                "spawned worker"
            );
            Ok(())
        }
        Err(source) => {
            error!(queue = %shared.identifier, worker_id, error = %source, "failed to spawn worker");
            Err(WorkQueueError::Spawn {
                queue: shared.identifier.clone(),
                source,
            })
        }
    }
}

fn run(queue: &WorkQueue, worker_id: usize) {
    let _current = CurrentGuard::enter(queue);
    let shared = &*queue.shared;
    let idle_timeout = shared.config.idle_timeout();
    debug!(queue = %shared.identifier, worker_id, "worker started");

    let mut state = shared.state.lock();
    loop {
        if shared.barrier_active.load(Ordering::Acquire) {
            state = shared.barrier.wait(state);
            continue;
        }

        if let Some(item) = shared.try_dequeue(&mut state) {
            // Several submissions can land on one sleeper; hand the rest on.
            let more = shared.can_dispatch(&state);
            if more {
                provision(queue, &mut state);
            }
            drop(state);
            if more {
                shared.idle.notify_one();
            }
            shared.run_item(queue, Some(worker_id), item);
            state = shared.state.lock();
            continue;
        }

        if state.shutting_down && state.pending.is_empty() {
            break;
        }

        shared.counters.sleeping.fetch_add(1, Ordering::Relaxed);
        let (reacquired, woken) = shared.idle.wait_for(state, idle_timeout);
        state = reacquired;
        shared.counters.sleeping.fetch_sub(1, Ordering::Relaxed);

        if !woken && !state.shutting_down && !shared.can_dispatch(&state) {
            debug!(queue = %shared.identifier, worker_id, "worker idle past grace period, retiring");
            break;
        }
    }

    state.threads -= 1;
    if let Some(handle) = state.workers.remove(&worker_id) {
        state.retired.push(handle);
    }
    let remaining = state.threads;
    drop(state);
    debug!(queue = %shared.identifier, worker_id, remaining, "worker exiting");
}

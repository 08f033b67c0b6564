//! Process-wide main and global queues.
//!
//! The registry is explicit: the application bootstrap calls [`initialize`]
//! on the thread that will pump the main queue, and the shutdown sequence
//! calls [`tear_down`]. Nothing is created lazily and nothing is left to
//! static destructors, so global workers are always joined before the queues
//! they serve go away.

use parking_lot::{const_rwlock, RwLock};
use tracing::info;

use crate::config::WorkQueueConfig;
use crate::core::error::WorkQueueError;
use crate::core::policy::{Priority, TeardownMode};
use crate::core::work_queue::WorkQueue;

/// Identifier of the main queue.
pub const MAIN_QUEUE_IDENTIFIER: &str = "main";

static REGISTRY: RwLock<Option<Registry>> = const_rwlock(None);

struct Registry {
    main: WorkQueue,
    /// Indexed like [`Priority::ALL`].
    globals: [WorkQueue; 3],
}

const fn global_index(priority: Priority) -> usize {
    match priority {
        Priority::High => 0,
        Priority::Default => 1,
        Priority::Background => 2,
    }
}

/// Creates the main queue (bound to the calling thread) and one concurrent
/// global queue per priority.
///
/// # Errors
///
/// - [`WorkQueueError::InvalidConfig`] if `config` does not validate
/// - [`WorkQueueError::AlreadyInitialized`] if called twice without [`tear_down`]
pub fn initialize(config: WorkQueueConfig) -> Result<(), WorkQueueError> {
    config.validate().map_err(WorkQueueError::InvalidConfig)?;

    let mut slot = REGISTRY.write();
    if slot.is_some() {
        return Err(WorkQueueError::AlreadyInitialized);
    }

    let main = WorkQueue::new_main(MAIN_QUEUE_IDENTIFIER, config.clone());
    let globals = Priority::ALL.map(|priority| {
        WorkQueue::new_global(priority, format!("global.{}", priority.as_str()), config.clone())
    });
    *slot = Some(Registry { main, globals });

    info!(
        hardware_concurrency = config.hardware_concurrency(),
        "work queue registry initialized"
    );
    Ok(())
}

/// Shuts the registry down: global queues first (background to high, each
/// drained and joined), then the main queue, which drains when this runs on
/// its owning thread and discards its backlog otherwise.
///
/// Items still running during teardown can keep resolving
/// [`WorkQueue::main_queue`]; the registry is cleared only at the end.
///
/// # Errors
///
/// [`WorkQueueError::NotInitialized`] if there is nothing to tear down.
pub fn tear_down() -> Result<(), WorkQueueError> {
    let (main, globals) = {
        let guard = REGISTRY.read();
        let registry = guard.as_ref().ok_or(WorkQueueError::NotInitialized)?;
        (registry.main.clone(), registry.globals.clone())
    };

    for queue in globals.iter().rev() {
        queue.shutdown(TeardownMode::Drain);
    }
    main.shutdown(TeardownMode::Drain);

    REGISTRY.write().take();
    info!("work queue registry torn down");
    Ok(())
}

/// Whether [`initialize`] has run without a matching [`tear_down`].
#[must_use]
pub fn is_initialized() -> bool {
    REGISTRY.read().is_some()
}

pub(crate) fn main_queue() -> Result<WorkQueue, WorkQueueError> {
    REGISTRY
        .read()
        .as_ref()
        .map(|registry| registry.main.clone())
        .ok_or(WorkQueueError::NotInitialized)
}

pub(crate) fn global_queue(priority: Priority) -> Result<WorkQueue, WorkQueueError> {
    REGISTRY
        .read()
        .as_ref()
        .map(|registry| registry.globals[global_index(priority)].clone())
        .ok_or(WorkQueueError::NotInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_index_matches_all() {
        for (index, priority) in Priority::ALL.into_iter().enumerate() {
            assert_eq!(global_index(priority), index);
        }
    }
}

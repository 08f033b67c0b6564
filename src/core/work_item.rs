//! The unit of scheduled work.

use std::fmt;

/// Boxed callable stored in a queue's pending buffer.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A callable plus its barrier flag.
///
/// Created at submission, owned by the queue's pending buffer until exactly one
/// worker (or the draining thread) takes it, then consumed.
pub struct WorkItem {
    task: Task,
    barrier: bool,
}

impl WorkItem {
    /// Wraps `task` as an ordinary item.
    pub fn new<F>(task: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            task: Box::new(task),
            barrier: false,
        }
    }

    /// Wraps `task` as a barrier item.
    pub fn barrier<F>(task: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            task: Box::new(task),
            barrier: true,
        }
    }

    /// Whether this item needs exclusive execution on its queue.
    #[must_use]
    pub const fn is_barrier(&self) -> bool {
        self.barrier
    }

    /// Consumes the item, yielding the callable.
    #[must_use]
    pub fn into_task(self) -> Task {
        self.task
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkItem")
            .field("barrier", &self.barrier)
            .finish_non_exhaustive()
    }
}

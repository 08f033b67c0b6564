//! Error types for queue operations and task outcomes.

use std::any::Any;

use thiserror::Error;

/// Errors produced when submitting to, draining, or managing a work queue.
#[derive(Debug, Error)]
pub enum WorkQueueError {
    /// The queue has been shut down and accepts no more work.
    #[error("work queue `{queue}` has been shut down")]
    ShutDown {
        /// Identifier of the queue.
        queue: String,
    },
    /// A thread serving a queue tried to block on that same queue in a way
    /// that would deadlock.
    #[error("synchronous submission to `{queue}` from one of its own threads would deadlock")]
    RecursiveSynchronous {
        /// Identifier of the queue.
        queue: String,
    },
    /// The global registry has not been initialized.
    #[error("work queue registry is not initialized")]
    NotInitialized,
    /// The global registry was already initialized.
    #[error("work queue registry is already initialized")]
    AlreadyInitialized,
    /// The main queue was drained from a thread that does not own it.
    #[error("main queue `{queue}` can only be drained by its owning thread")]
    WrongThread {
        /// Identifier of the queue.
        queue: String,
    },
    /// A main-queue-only operation was called on a threaded queue.
    #[error("`{queue}` is not a main queue")]
    NotMainQueue {
        /// Identifier of the queue.
        queue: String,
    },
    /// A worker thread could not be started.
    #[error("failed to spawn worker for `{queue}`: {source}")]
    Spawn {
        /// Identifier of the queue.
        queue: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Why a [`WorkFuture`](super::WorkFuture) did not yield a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task panicked; the message is the panic payload when it was a string.
    #[error("task panicked: {message}")]
    Panicked {
        /// Panic message.
        message: String,
    },
    /// The task was discarded before it could run.
    #[error("task was abandoned before it ran")]
    Abandoned,
    /// A bounded wait for the result expired.
    #[error("timed out waiting for task result")]
    Timeout,
}

impl TaskError {
    /// Builds a [`TaskError::Panicked`] from a `catch_unwind` payload.
    #[must_use]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        Self::Panicked {
            message: panic_message(payload),
        }
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

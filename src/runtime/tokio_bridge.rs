//! Awaiting [`WorkFuture`]s from a tokio runtime.
//!
//! `WorkFuture::get` parks the calling thread, which must not happen on an
//! async executor thread. The bridge moves the wait onto tokio's blocking
//! pool so async callers can hand work to a queue and `.await` the result.

use crate::core::{TaskError, WorkFuture};

impl<T: Send + 'static> WorkFuture<T> {
    /// Awaits the result without blocking the async executor.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// The same errors as [`WorkFuture::get`]; [`TaskError::Abandoned`] if the
    /// blocking wait itself was cancelled by runtime shutdown.
    pub async fn get_async(self) -> Result<T, TaskError> {
        if self.is_ready() {
            return self.get();
        }
        tokio::task::spawn_blocking(move || self.get())
            .await
            .unwrap_or(Err(TaskError::Abandoned))
    }
}

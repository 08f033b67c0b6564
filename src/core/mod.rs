//! Work queues, the items they run, and the process-wide queue registry.

pub mod error;
pub mod future;
pub mod policy;
pub mod registry;
pub mod work_item;
pub mod work_queue;

pub use error::{TaskError, WorkQueueError};
pub use future::WorkFuture;
pub use policy::{Priority, QueueMode, TeardownMode};
pub use registry::{initialize, is_initialized, tear_down, MAIN_QUEUE_IDENTIFIER};
pub use work_item::{Task, WorkItem};
pub use work_queue::{QueueStats, WorkQueue};

//! # workqueue
//!
//! Serial and concurrent work queues backed by self-sizing sets of OS threads.
//!
//! A [`WorkQueue`] accepts closures and runs them on its own worker threads.
//! Serial queues run one item at a time in submission order; concurrent queues
//! widen with the outstanding work, bounded by priority class and hardware
//! parallelism. Any item can be submitted as a *barrier*, which waits for
//! everything queued before it, runs alone, and holds back everything queued
//! after it.
//!
//! ## Key Features
//!
//! - **Fire-and-forget, synchronous and future-returning submission**: panics
//!   are logged, propagated to the blocked caller, or captured in the future
//! - **Barriers** on any queue, synchronous or not
//! - **Nestable suspend/resume** that holds dispatch without cancelling work
//! - **Explicit registry** of a thread-less main queue and one global
//!   concurrent queue per priority, with ordered teardown
//! - **Address-keyed thread parking**: [`sync::Condition`] is a single atomic
//!   flag; waiting threads park in a process-wide bucket table
//!
//! ## Example
//!
//! ```rust
//! use workqueue::{Priority, QueueMode, TeardownMode, WorkQueue};
//!
//! let queue = WorkQueue::new(Priority::Default, QueueMode::Serial, "demo");
//! let future = queue.perform_with_future(|| 40 + 2).unwrap();
//! let doubled = queue.perform_synchronous(|| 21 * 2).unwrap();
//! assert_eq!(future.get(), Ok(doubled));
//! queue.shutdown(TeardownMode::Drain);
//! ```
//!
//! ## Main and global queues
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use workqueue::config::WorkQueueConfig;
//! use workqueue::{registry, Priority, WorkQueue};
//!
//! registry::initialize(WorkQueueConfig::from_env().unwrap_or_default())?;
//!
//! let main = WorkQueue::main_queue()?;
//! WorkQueue::global_queue(Priority::Background)?.perform(move || {
//!     let result = 7;
//!     main.perform(move || println!("back on main: {result}")).ok();
//! })?;
//!
//! // Application pump.
//! WorkQueue::main_queue()?.drain_for(Duration::from_millis(100))?;
//!
//! registry::tear_down()?;
//! # Ok::<(), workqueue::WorkQueueError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Work queues, work items, futures, and the queue registry.
pub mod core;
/// Configuration models for queue tuning and declarative queue sets.
pub mod config;
/// Builders to construct queues from configuration.
pub mod builders;
/// Async runtime adapters.
pub mod runtime;
/// Thread parking and the condition primitive built on it.
pub mod sync;
/// Shared utilities.
pub mod util;

pub use crate::core::registry;
pub use crate::core::{
    Priority, QueueMode, QueueStats, TaskError, TeardownMode, WorkFuture, WorkItem, WorkQueue,
    WorkQueueError,
};
pub use crate::sync::Condition;

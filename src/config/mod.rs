//! Configuration models for queue tuning and declarative queue sets.

pub mod queue;

pub use queue::{QueueSpec, SchedulerConfig, WorkQueueConfig};

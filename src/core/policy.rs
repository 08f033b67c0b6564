//! Queue classification: priority, execution mode and teardown behavior.

use serde::{Deserialize, Serialize};

/// Scheduling class of a queue. Drives the concurrency width of concurrent queues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Latency-sensitive work; may burst past the hardware thread count.
    High,
    /// Regular work; bounded by the hardware thread count.
    #[default]
    Default,
    /// Throughput work that should leave headroom for everything else.
    Background,
}

impl Priority {
    /// All priorities, highest first.
    pub const ALL: [Self; 3] = [Self::High, Self::Default, Self::Background];

    /// Short lowercase name used in identifiers and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Default => "default",
            Self::Background => "background",
        }
    }
}

/// How a queue executes its items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueMode {
    /// One item at a time, strictly in submission order.
    #[default]
    Serial,
    /// Several items at once, up to the queue's width.
    Concurrent,
}

/// What [`WorkQueue::shutdown`](super::WorkQueue::shutdown) does with pending items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TeardownMode {
    /// Run every pending item to completion before the workers exit.
    #[default]
    Drain,
    /// Drop pending items; only items already running are finished.
    Discard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueueKind {
    Threaded(QueueMode),
    Main,
}

//! Low-level blocking primitives the work queues are built on.
//!
//! [`thread_park`] is a process-wide, address-keyed parking lot: threads block
//! under a key and are woken by key, without any synchronization object being
//! allocated per wait site. [`Condition`] layers wait/notify semantics on top
//! of it with a lock-free fast path when nobody is waiting.

pub mod condition;
pub mod thread_park;

pub use condition::Condition;
pub use thread_park::{ParkResult, UnparkResult};

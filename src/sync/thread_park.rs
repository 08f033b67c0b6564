//! Address-keyed thread parking.
//!
//! A fixed table of wait buckets is shared by the whole process. A thread
//! parks under a key (in practice the address of the flag owned by the
//! primitive it waits on) and is woken by [`unpark_one`] or [`unpark_all`]
//! with the same key. Every thread lazily owns a single parker that it reuses
//! for every wait, so waiting on a new primitive never allocates an OS object.
//!
//! The protocol mirrors the classic parking-lot design:
//!
//! 1. lock the bucket for `key`
//! 2. run `validate`; abort with [`ParkResult::Invalid`] if it fails
//! 3. enqueue the current thread and unlock the bucket
//! 4. run `before_block` (typically: release the caller's own lock)
//! 5. block until unparked or the deadline passes
//!
//! Because `validate` runs under the bucket lock and the unpark side takes the
//! same lock, a wake issued after `validate` returned cannot be missed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{const_mutex, Condvar, Mutex};
use parking_lot_core::SpinWait;

const BUCKET_BITS: u32 = 6;
const BUCKET_COUNT: usize = 1 << BUCKET_BITS;

static BUCKETS: [Bucket; BUCKET_COUNT] = [const { Bucket::new() }; BUCKET_COUNT];

thread_local! {
    static PARKER: Arc<Parker> = Arc::new(Parker::new());
}

/// Outcome of a [`park`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParkResult {
    /// Another thread unparked this one.
    Woken,
    /// The deadline passed before a wake arrived.
    TimedOut,
    /// `validate` returned `false`; the thread never blocked.
    Invalid,
}

/// Information handed to the [`unpark_one`] callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnparkResult {
    /// Whether a thread was removed from the queue and is being woken.
    pub unparked: bool,
    /// Whether other threads are still parked under the same key.
    pub has_more: bool,
}

struct Waiter {
    key: usize,
    parker: Arc<Parker>,
}

struct Bucket {
    queue: Mutex<Vec<Waiter>>,
}

impl Bucket {
    const fn new() -> Self {
        Self {
            queue: const_mutex(Vec::new()),
        }
    }
}

/// Per-thread blocking slot.
struct Parker {
    notified: AtomicBool,
    lock: Mutex<()>,
    signal: Condvar,
}

impl Parker {
    const fn new() -> Self {
        Self {
            notified: AtomicBool::new(false),
            lock: const_mutex(()),
            signal: Condvar::new(),
        }
    }

    fn prepare(&self) {
        self.notified.store(false, Ordering::Relaxed);
    }

    /// Blocks until notified or `deadline`. Returns whether a notification arrived.
    fn block(&self, deadline: Option<Instant>) -> bool {
        let mut spin = SpinWait::new();
        while !self.notified.load(Ordering::Acquire) {
            if !spin.spin() {
                break;
            }
        }

        let mut guard = self.lock.lock();
        while !self.notified.load(Ordering::Acquire) {
            match deadline {
                Some(deadline) => {
                    if self.signal.wait_until(&mut guard, deadline).timed_out() {
                        return self.notified.load(Ordering::Acquire);
                    }
                }
                None => self.signal.wait(&mut guard),
            }
        }
        true
    }

    fn unpark(&self) {
        let _guard = self.lock.lock();
        self.notified.store(true, Ordering::Release);
        self.signal.notify_one();
    }
}

fn bucket(key: usize) -> &'static Bucket {
    // Fibonacci hashing, top bits select the bucket.
    let hash = (key as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15) >> (64 - BUCKET_BITS);
    &BUCKETS[hash as usize]
}

fn current_parker() -> Arc<Parker> {
    PARKER
        .try_with(Arc::clone)
        .unwrap_or_else(|_| Arc::new(Parker::new()))
}

/// Parks the current thread under `key`.
///
/// `validate` runs while the bucket is locked, right after the thread has been
/// accounted for but before it is visible to unparkers; returning `false`
/// aborts the park without blocking and without calling `before_block`.
/// `before_block` runs once the thread is enqueued and the bucket is unlocked,
/// so releasing a lock there cannot race with a wake.
///
/// `validate` must not park, unpark, or panic: it runs with the bucket lock
/// held. `before_block` may unpark other keys but must not park.
pub fn park<V, B>(key: usize, validate: V, before_block: B, deadline: Option<Instant>) -> ParkResult
where
    V: FnOnce() -> bool,
    B: FnOnce(),
{
    let parker = current_parker();
    parker.prepare();

    let bucket = bucket(key);
    {
        let mut queue = bucket.queue.lock();
        if !validate() {
            return ParkResult::Invalid;
        }
        queue.push(Waiter {
            key,
            parker: Arc::clone(&parker),
        });
    }

    before_block();

    if parker.block(deadline) {
        return ParkResult::Woken;
    }

    let mut queue = bucket.queue.lock();
    if let Some(pos) = queue.iter().position(|w| Arc::ptr_eq(&w.parker, &parker)) {
        queue.remove(pos);
        return ParkResult::TimedOut;
    }
    drop(queue);

    // An unparker dequeued us between the timeout and the bucket lock; its
    // notification is already on the way.
    parker.block(None);
    ParkResult::Woken
}

/// Wakes the oldest thread parked under `key`, if any.
///
/// `callback` runs while the bucket is still locked, so state it updates (for
/// example a "has waiters" flag) is consistent with concurrent [`park`] calls.
/// Returns whether a thread was woken.
pub fn unpark_one<C>(key: usize, callback: C) -> bool
where
    C: FnOnce(UnparkResult),
{
    let bucket = bucket(key);
    let mut queue = bucket.queue.lock();
    let woken = queue
        .iter()
        .position(|w| w.key == key)
        .map(|pos| queue.remove(pos));
    let has_more = queue.iter().any(|w| w.key == key);
    callback(UnparkResult {
        unparked: woken.is_some(),
        has_more,
    });
    drop(queue);

    woken.is_some_and(|waiter| {
        waiter.parker.unpark();
        true
    })
}

/// Wakes every thread parked under `key`. Returns how many were woken.
pub fn unpark_all(key: usize) -> usize {
    let bucket = bucket(key);
    let woken: Vec<Waiter> = {
        let mut queue = bucket.queue.lock();
        let (woken, kept) = queue.drain(..).partition(|w| w.key == key);
        *queue = kept;
        woken
    };

    for waiter in &woken {
        waiter.parker.unpark();
    }
    woken.len()
}

/// Number of threads currently parked under `key`.
#[must_use]
pub fn parked_count(key: usize) -> usize {
    bucket(key).queue.lock().iter().filter(|w| w.key == key).count()
}

//! Condition variable built on [`thread_park`](super::thread_park).
//!
//! A [`Condition`] is a single `AtomicBool`; it owns no OS resource. Waiters
//! park under the address of that flag, and notifiers skip the parking lot
//! entirely while the flag says nobody is waiting.
//!
//! The waiter raises the flag from inside the park `validate` step (bucket
//! locked, thread already accounted for) and releases the caller's lock only
//! afterwards, in `before_block`. A notifier that takes the same lock, mutates
//! state and then calls [`Condition::notify_one`] therefore always observes
//! the raised flag and always finds the waiter enqueued.
//!
//! Waits take the guard by value and hand it back re-acquired, so any
//! [`lock_api`] mutex works, including [`parking_lot::Mutex`].
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//! use parking_lot::Mutex;
//! use workqueue::sync::Condition;
//!
//! let pair = Arc::new((Mutex::new(false), Condition::new()));
//! let pair2 = Arc::clone(&pair);
//!
//! thread::spawn(move || {
//!     let (lock, cond) = &*pair2;
//!     *lock.lock() = true;
//!     cond.notify_one();
//! });
//!
//! let (lock, cond) = &*pair;
//! let ready = cond.wait_with(lock.lock(), |ready| *ready);
//! assert!(*ready);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use lock_api::{MutexGuard, RawMutex};

use super::thread_park::{self, ParkResult};

/// Wait/notify primitive with a no-syscall notify path.
#[derive(Debug, Default)]
pub struct Condition {
    has_waiters: AtomicBool,
}

impl Condition {
    /// Creates a condition with no waiters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            has_waiters: AtomicBool::new(false),
        }
    }

    fn key(&self) -> usize {
        std::ptr::from_ref(&self.has_waiters) as usize
    }

    fn park<'a, R, T>(
        &self,
        guard: MutexGuard<'a, R, T>,
        deadline: Option<Instant>,
    ) -> (MutexGuard<'a, R, T>, bool)
    where
        R: RawMutex + 'a,
        T: ?Sized + 'a,
    {
        let mutex = MutexGuard::mutex(&guard);
        let result = thread_park::park(
            self.key(),
            || {
                self.has_waiters.store(true, Ordering::Release);
                true
            },
            move || drop(guard),
            deadline,
        );
        (mutex.lock(), result == ParkResult::Woken)
    }

    /// Releases `guard`, blocks until notified or `deadline`, and re-acquires
    /// the lock.
    ///
    /// Returns the guard and `true` if the thread was woken by a notify,
    /// `false` if the deadline passed (or had already passed on entry, in
    /// which case the lock is never released).
    pub fn wait_until<'a, R, T>(
        &self,
        guard: MutexGuard<'a, R, T>,
        deadline: Instant,
    ) -> (MutexGuard<'a, R, T>, bool)
    where
        R: RawMutex + 'a,
        T: ?Sized + 'a,
    {
        if deadline <= Instant::now() {
            return (guard, false);
        }
        self.park(guard, Some(deadline))
    }

    /// Waits until `predicate` holds or `deadline` passes.
    ///
    /// Returns the guard and the final value of `predicate`.
    pub fn wait_until_with<'a, R, T, F>(
        &self,
        mut guard: MutexGuard<'a, R, T>,
        deadline: Instant,
        mut predicate: F,
    ) -> (MutexGuard<'a, R, T>, bool)
    where
        R: RawMutex + 'a,
        T: ?Sized + 'a,
        F: FnMut(&mut T) -> bool,
    {
        while !predicate(&mut *guard) {
            let (reacquired, woken) = self.wait_until(guard, deadline);
            guard = reacquired;
            if !woken {
                let satisfied = predicate(&mut *guard);
                return (guard, satisfied);
            }
        }
        (guard, true)
    }

    /// [`wait_until`](Self::wait_until) with a deadline relative to now.
    pub fn wait_for<'a, R, T>(
        &self,
        guard: MutexGuard<'a, R, T>,
        timeout: Duration,
    ) -> (MutexGuard<'a, R, T>, bool)
    where
        R: RawMutex + 'a,
        T: ?Sized + 'a,
    {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_until(guard, deadline),
            None => (self.wait(guard), true),
        }
    }

    /// [`wait_until_with`](Self::wait_until_with) with a deadline relative to now.
    pub fn wait_for_with<'a, R, T, F>(
        &self,
        guard: MutexGuard<'a, R, T>,
        timeout: Duration,
        predicate: F,
    ) -> (MutexGuard<'a, R, T>, bool)
    where
        R: RawMutex + 'a,
        T: ?Sized + 'a,
        F: FnMut(&mut T) -> bool,
    {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.wait_until_with(guard, deadline, predicate),
            None => (self.wait_with(guard, predicate), true),
        }
    }

    /// Releases `guard` and blocks until notified. Spurious returns are
    /// possible; prefer [`wait_with`](Self::wait_with).
    pub fn wait<'a, R, T>(&self, guard: MutexGuard<'a, R, T>) -> MutexGuard<'a, R, T>
    where
        R: RawMutex + 'a,
        T: ?Sized + 'a,
    {
        self.park(guard, None).0
    }

    /// Blocks until `predicate` holds.
    pub fn wait_with<'a, R, T, F>(
        &self,
        mut guard: MutexGuard<'a, R, T>,
        mut predicate: F,
    ) -> MutexGuard<'a, R, T>
    where
        R: RawMutex + 'a,
        T: ?Sized + 'a,
        F: FnMut(&mut T) -> bool,
    {
        while !predicate(&mut *guard) {
            guard = self.wait(guard);
        }
        guard
    }

    /// Wakes one waiter. Returns whether a thread was woken.
    pub fn notify_one(&self) -> bool {
        if !self.has_waiters.load(Ordering::Acquire) {
            return false;
        }

        thread_park::unpark_one(self.key(), |result| {
            if !result.has_more {
                self.has_waiters.store(false, Ordering::Release);
            }
        })
    }

    /// Wakes every waiter. Returns how many threads were woken.
    pub fn notify_all(&self) -> usize {
        if !self.has_waiters.load(Ordering::Acquire) {
            return 0;
        }

        self.has_waiters.store(false, Ordering::Release);
        thread_park::unpark_all(self.key())
    }

    /// Whether a thread may currently be parked on this condition.
    #[must_use]
    pub fn has_waiters(&self) -> bool {
        self.has_waiters.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_notify_without_waiters_is_noop() {
        let cond = Condition::new();
        assert!(!cond.has_waiters());
        assert!(!cond.notify_one());
        assert_eq!(cond.notify_all(), 0);
    }

    #[test]
    fn test_wait_for_times_out() {
        let mutex = Mutex::new(());
        let cond = Condition::new();

        let start = Instant::now();
        let (_guard, woken) = cond.wait_for(mutex.lock(), Duration::from_millis(10));
        assert!(!woken);
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_past_deadline_keeps_lock() {
        let mutex = Mutex::new(5);
        let cond = Condition::new();

        let (guard, woken) = cond.wait_until(mutex.lock(), Instant::now());
        assert!(!woken);
        assert_eq!(*guard, 5);
        assert!(mutex.is_locked());
    }

    #[test]
    fn test_wait_with_predicate() {
        let pair = Arc::new((Mutex::new(0), Condition::new()));
        let pair2 = Arc::clone(&pair);

        thread::spawn(move || {
            let (lock, cond) = &*pair2;
            for i in 1..=10 {
                thread::sleep(Duration::from_millis(2));
                *lock.lock() = i;
                cond.notify_one();
            }
        });

        let (lock, cond) = &*pair;
        let count = cond.wait_with(lock.lock(), |c| *c == 10);
        assert_eq!(*count, 10);
    }

    #[test]
    fn test_predicate_timeout_returns_final_value() {
        let mutex = Mutex::new(false);
        let cond = Condition::new();

        let (guard, satisfied) =
            cond.wait_for_with(mutex.lock(), Duration::from_millis(5), |ready| *ready);
        assert!(!satisfied);
        assert!(!*guard);
    }

    #[test]
    fn test_notify_all_clears_flag() {
        let pair = Arc::new((Mutex::new(false), Condition::new()));
        let mut handles = vec![];

        for _ in 0..4 {
            let pair = Arc::clone(&pair);
            handles.push(thread::spawn(move || {
                let (lock, cond) = &*pair;
                let _ready = cond.wait_with(lock.lock(), |ready| *ready);
            }));
        }

        thread::sleep(Duration::from_millis(20));
        {
            let (lock, cond) = &*pair;
            *lock.lock() = true;
            cond.notify_all();
            assert!(!cond.has_waiters());
        }

        for handle in handles {
            handle.join().unwrap();
        }
    }
}

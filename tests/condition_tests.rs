//! Integration tests for Condition
//!
//! These tests verify that Condition works correctly in realistic scenarios,
//! including the release-then-park protocol under heavy wake/wait racing.

use parking_lot::Mutex;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use workqueue::sync::Condition;

/// Test a simple producer-consumer pattern
#[test]
fn test_producer_consumer_queue() {
    const NUM_ITEMS: usize = 100;

    let shared = Arc::new((Mutex::new(Vec::<usize>::new()), Condition::new()));
    let producer_side = Arc::clone(&shared);

    let producer = thread::spawn(move || {
        for i in 0..NUM_ITEMS {
            let (lock, cond) = &*producer_side;
            lock.lock().push(i);
            cond.notify_one();
        }
    });

    let mut received = Vec::new();
    let (lock, cond) = &*shared;
    while received.len() < NUM_ITEMS {
        let mut items = cond.wait_with(lock.lock(), |items| !items.is_empty());
        received.append(&mut items);
    }

    producer.join().unwrap();
    received.sort_unstable();
    assert_eq!(received, (0..NUM_ITEMS).collect::<Vec<_>>());
}

/// Every waiter wakes on notify_all
#[test]
fn test_notify_all_releases_every_waiter() {
    const WAITERS: usize = 8;

    let shared = Arc::new((Mutex::new(false), Condition::new()));
    let handles: Vec<_> = (0..WAITERS)
        .map(|_| {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                let (lock, cond) = &*shared;
                let open = cond.wait_with(lock.lock(), |open| *open);
                assert!(*open);
            })
        })
        .collect();

    let (lock, cond) = &*shared;
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond.has_waiters() {
        assert!(Instant::now() < deadline, "waiters never parked");
        thread::yield_now();
    }
    *lock.lock() = true;
    cond.notify_all();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(!cond.has_waiters());
}

/// A bounded wait reports the timeout and returns the guard
#[test]
fn test_wait_for_times_out() {
    let lock = Mutex::new(0_u32);
    let cond = Condition::new();

    let start = Instant::now();
    let (guard, woken) = cond.wait_for(lock.lock(), Duration::from_millis(30));
    assert!(!woken);
    assert_eq!(*guard, 0);
    assert!(start.elapsed() >= Duration::from_millis(25));
}

/// The predicate form returns the final predicate value on timeout
#[test]
fn test_wait_for_with_predicate_false_on_timeout() {
    let lock = Mutex::new(false);
    let cond = Condition::new();
    let (_guard, satisfied) = cond.wait_for_with(lock.lock(), Duration::from_millis(10), |ready| *ready);
    assert!(!satisfied);
}

/// The lock is free while a thread waits on it
#[test]
fn test_wait_releases_lock() {
    let shared = Arc::new((Mutex::new(0_u32), Condition::new()));
    let waiter_side = Arc::clone(&shared);

    let waiter = thread::spawn(move || {
        let (lock, cond) = &*waiter_side;
        let value = cond.wait_with(lock.lock(), |value| *value == 7);
        *value
    });

    let (lock, cond) = &*shared;
    thread::sleep(Duration::from_millis(20));
    *lock.lock() = 7;
    cond.notify_one();

    assert_eq!(waiter.join().unwrap(), 7);
}

/// Notify without waiters is a no-op
#[test]
fn test_notify_without_waiters() {
    let cond = Condition::new();
    assert!(!cond.has_waiters());
    assert!(!cond.notify_one());
    assert_eq!(cond.notify_all(), 0);
}

/// No missed wakeup: thousands of wait/notify handshakes finish well within
/// a generous watchdog timeout.
#[test]
fn test_no_missed_wakeup_stress() {
    const ITERATIONS: usize = 5_000;

    let (done_tx, done_rx) = mpsc::channel();
    let shared = Arc::new((Mutex::new(0_usize), Condition::new()));
    let notifier_side = Arc::clone(&shared);

    let waiter_side = Arc::clone(&shared);
    let waiter = thread::spawn(move || {
        let (lock, cond) = &*waiter_side;
        for round in 1..=ITERATIONS {
            let guard = cond.wait_with(lock.lock(), |seen| *seen >= round);
            drop(guard);
        }
        done_tx.send(()).unwrap();
    });

    let notifier = thread::spawn(move || {
        let (lock, cond) = &*notifier_side;
        for _ in 0..ITERATIONS {
            *lock.lock() += 1;
            cond.notify_one();
        }
    });

    done_rx
        .recv_timeout(Duration::from_secs(30))
        .expect("waiter deadlocked: a wakeup was missed");
    notifier.join().unwrap();
    waiter.join().unwrap();
}

/// Ping-pong between two threads, each waiting for the other's turn
#[test]
fn test_ping_pong_stress() {
    const ROUNDS: usize = 2_000;

    let (done_tx, done_rx) = mpsc::channel();
    let shared = Arc::new((Mutex::new(0_usize), Condition::new()));

    let handles: Vec<_> = (0..2)
        .map(|parity| {
            let shared = Arc::clone(&shared);
            let done_tx = done_tx.clone();
            thread::spawn(move || {
                let (lock, cond) = &*shared;
                for _ in 0..ROUNDS {
                    let mut turn = cond.wait_with(lock.lock(), |turn| *turn % 2 == parity);
                    *turn += 1;
                    drop(turn);
                    cond.notify_all();
                }
                done_tx.send(()).unwrap();
            })
        })
        .collect();
    drop(done_tx);

    for _ in 0..2 {
        done_rx
            .recv_timeout(Duration::from_secs(30))
            .expect("ping-pong stalled");
    }
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(*shared.0.lock(), ROUNDS * 2);
}

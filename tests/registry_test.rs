//! Integration test for the process-wide queue registry
//!
//! The registry is global state, so the whole lifecycle runs in one test:
//! initialize, use the main and global queues, tear down, re-initialize.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use workqueue::config::WorkQueueConfig;
use workqueue::core::MAIN_QUEUE_IDENTIFIER;
use workqueue::{registry, Priority, QueueMode, WorkQueue, WorkQueueError};

/// Full registry lifecycle
#[test]
fn test_registry_lifecycle() {
    assert!(!registry::is_initialized());
    assert!(matches!(WorkQueue::main_queue(), Err(WorkQueueError::NotInitialized)));
    assert!(matches!(
        WorkQueue::global_queue(Priority::High),
        Err(WorkQueueError::NotInitialized)
    ));
    assert!(matches!(registry::tear_down(), Err(WorkQueueError::NotInitialized)));

    let config = WorkQueueConfig::new().with_hardware_concurrency(2);
    registry::initialize(config.clone()).unwrap();
    assert!(registry::is_initialized());
    assert!(matches!(
        registry::initialize(config.clone()),
        Err(WorkQueueError::AlreadyInitialized)
    ));

    // Globals are stable, concurrent, and sized by priority.
    let widths: Vec<_> = Priority::ALL
        .into_iter()
        .map(|priority| {
            let queue = WorkQueue::global_queue(priority).unwrap();
            assert_eq!(queue, WorkQueue::global_queue(priority).unwrap());
            assert_eq!(queue.mode(), QueueMode::Concurrent);
            assert_eq!(queue.identifier(), format!("global.{}", priority.as_str()));
            queue.max_width()
        })
        .collect();
    assert_eq!(widths, vec![4, 2, 1]);

    // The main queue runs only when this thread pumps it.
    let main = WorkQueue::main_queue().unwrap();
    assert!(main.is_main());
    assert_eq!(main.identifier(), MAIN_QUEUE_IDENTIFIER);

    let hops = Arc::new(AtomicUsize::new(0));
    let (done_tx, done_rx) = mpsc::channel();
    {
        let hops = Arc::clone(&hops);
        let background = WorkQueue::global_queue(Priority::Background).unwrap();
        background
            .perform(move || {
                hops.fetch_add(1, Ordering::SeqCst);
                let main = WorkQueue::main_queue().unwrap();
                main.perform(move || {
                    if WorkQueue::current().is_some_and(|q| q.is_main()) {
                        hops.fetch_add(1, Ordering::SeqCst);
                    }
                })
                .unwrap();
                done_tx.send(()).unwrap();
            })
            .unwrap();
    }
    done_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(hops.load(Ordering::SeqCst), 1);

    let mut ran = 0;
    for _ in 0..100 {
        ran += main.drain_for(Duration::from_millis(50)).unwrap();
        if ran > 0 {
            break;
        }
    }
    assert_eq!(ran, 1);
    assert_eq!(hops.load(Ordering::SeqCst), 2);

    // Synchronous submission to the main queue from its owner would deadlock.
    assert!(matches!(
        main.perform_synchronous(|| ()),
        Err(WorkQueueError::RecursiveSynchronous { .. })
    ));

    // Another thread can hand work to the main queue but not drain it.
    let other_main = main.clone();
    let drained_elsewhere = thread::spawn(move || other_main.drain()).join().unwrap();
    assert!(matches!(drained_elsewhere, Err(WorkQueueError::WrongThread { .. })));

    // Teardown drains pending main-queue work on the owner thread.
    let late = Arc::new(AtomicUsize::new(0));
    let late_hit = Arc::clone(&late);
    main.perform(move || {
        late_hit.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    let default_queue = WorkQueue::global_queue(Priority::Default).unwrap();

    registry::tear_down().unwrap();
    assert!(!registry::is_initialized());
    assert_eq!(late.load(Ordering::SeqCst), 1);
    assert!(main.is_shut_down());
    assert!(matches!(default_queue.perform(|| {}), Err(WorkQueueError::ShutDown { .. })));
    assert!(matches!(WorkQueue::main_queue(), Err(WorkQueueError::NotInitialized)));

    // A fresh registry starts from scratch.
    registry::initialize(config).unwrap();
    let fresh = WorkQueue::main_queue().unwrap();
    assert_ne!(fresh, main);
    registry::tear_down().unwrap();
}

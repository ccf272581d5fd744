//! Integration tests for WorkerPool
//!
//! These tests validate:
//! - Task execution across multiple workers
//! - Blocking and async result retrieval
//! - Queue limits and fail-fast submission
//! - Panic isolation
//! - Graceful and immediate shutdown

use prometheus_scheduled_pool::config::WorkerPoolConfig;
use prometheus_scheduled_pool::core::{SchedulerError, WorkerPool};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn make_pool(workers: usize, depth: usize) -> WorkerPool {
    WorkerPool::new(
        WorkerPoolConfig::new()
            .with_worker_count(workers)
            .with_max_queue_depth(depth)
            .with_thread_name_prefix("wp-test"),
    )
    .expect("pool should start")
}

/// Blocks the pool's only worker until the returned sender fires.
fn occupy_worker(pool: &WorkerPool) -> crossbeam_channel::Sender<()> {
    let (started_tx, started_rx) = crossbeam_channel::bounded::<()>(1);
    let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(1);
    pool.execute(Box::new(move || {
        started_tx.send(()).unwrap();
        let _ = release_rx.recv();
    }))
    .unwrap();
    started_rx.recv().unwrap();
    release_tx
}

// ============================================================================
// BASIC EXECUTION
// ============================================================================

#[test]
fn test_submit_returns_value() {
    let pool = make_pool(2, 16);
    let handle = pool.submit(|| "hello".to_string()).unwrap();
    assert_eq!(handle.get(Duration::from_secs(5)).unwrap(), "hello");
    pool.shutdown();
}

#[test]
fn test_jobs_spread_over_named_workers() {
    let pool = make_pool(4, 64);
    let names = Arc::new(Mutex::new(HashSet::new()));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let names = Arc::clone(&names);
            pool.submit(move || {
                thread::sleep(Duration::from_millis(5));
                let name = thread::current().name().unwrap_or_default().to_string();
                names.lock().unwrap().insert(name);
            })
            .unwrap()
        })
        .collect();

    for handle in handles {
        handle.get(Duration::from_secs(10)).unwrap();
    }
    pool.shutdown();

    let names = names.lock().unwrap();
    assert!(names.len() > 1, "expected several workers, got {names:?}");
    assert!(names.iter().all(|n| n.starts_with("wp-test-")));
}

#[test]
fn test_concurrent_submitters() {
    let pool = Arc::new(make_pool(4, 256));
    let total = Arc::new(AtomicUsize::new(0));

    let submitters: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let total = Arc::clone(&total);
            thread::spawn(move || {
                for _ in 0..50 {
                    let total = Arc::clone(&total);
                    pool.execute(Box::new(move || {
                        total.fetch_add(1, Ordering::SeqCst);
                    }))
                    .unwrap();
                }
            })
        })
        .collect();
    for s in submitters {
        s.join().unwrap();
    }

    pool.shutdown();
    assert_eq!(total.load(Ordering::SeqCst), 200);
    let stats = pool.stats();
    assert_eq!(stats.submitted_tasks, 200);
    assert_eq!(stats.completed_tasks, 200);
    assert_eq!(stats.queued_tasks, 0);
    assert_eq!(stats.active_tasks, 0);
}

// ============================================================================
// QUEUE LIMITS
// ============================================================================

#[test]
fn test_try_submit_fails_fast_when_full() {
    let pool = make_pool(1, 2);
    let release = occupy_worker(&pool);

    let a = pool.try_submit(|| 1).unwrap();
    let b = pool.try_submit(|| 2).unwrap();
    let err = pool.try_submit(|| 3).unwrap_err();
    assert!(matches!(err, SchedulerError::QueueFull(_)));

    release.send(()).unwrap();
    assert_eq!(a.get(Duration::from_secs(5)).unwrap(), 1);
    assert_eq!(b.get(Duration::from_secs(5)).unwrap(), 2);
    pool.shutdown();
}

#[test]
fn test_execute_waits_for_space() {
    let pool = Arc::new(make_pool(1, 1));
    let release = occupy_worker(&pool);
    pool.execute(Box::new(|| {})).unwrap();

    let blocked = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.submit(|| "made it").map(|h| h.join()))
    };
    thread::sleep(Duration::from_millis(30));
    assert!(!blocked.is_finished());

    release.send(()).unwrap();
    let result = blocked.join().unwrap().unwrap();
    assert_eq!(result.unwrap(), "made it");
    pool.shutdown();
}

#[test]
fn test_shutdown_now_wakes_blocked_execute() {
    let pool = Arc::new(make_pool(1, 1));
    let release = occupy_worker(&pool);
    pool.execute(Box::new(|| {})).unwrap();

    let blocked = {
        let pool = Arc::clone(&pool);
        thread::spawn(move || pool.execute(Box::new(|| {})))
    };
    thread::sleep(Duration::from_millis(30));

    let abandoned = pool.shutdown_now();
    assert_eq!(abandoned.len(), 1);
    assert_eq!(blocked.join().unwrap(), Err(SchedulerError::PoolShutdown));

    release.send(()).unwrap();
    assert!(pool.await_termination(Duration::from_secs(5)));
}

// ============================================================================
// FAILURES AND SHUTDOWN
// ============================================================================

#[test]
fn test_panic_reported_on_handle() {
    let pool = make_pool(1, 4);
    let handle = pool.submit(|| -> u32 { panic!("bad input") }).unwrap();
    assert_eq!(
        handle.join(),
        Err(SchedulerError::TaskPanicked("bad input".to_string()))
    );
    let after = pool.submit(|| 5).unwrap();
    assert_eq!(after.join().unwrap(), 5);
    pool.shutdown();
    assert_eq!(pool.stats().failed_tasks, 1);
}

#[test]
fn test_graceful_shutdown_drains_queue() {
    let pool = make_pool(1, 64);
    let done = Arc::new(AtomicUsize::new(0));
    for _ in 0..20 {
        let done = Arc::clone(&done);
        pool.execute(Box::new(move || {
            thread::sleep(Duration::from_millis(1));
            done.fetch_add(1, Ordering::SeqCst);
        }))
        .unwrap();
    }
    pool.shutdown();
    assert_eq!(done.load(Ordering::SeqCst), 20);
    assert!(pool.is_terminated());
    assert!(matches!(pool.submit(|| ()), Err(SchedulerError::PoolShutdown)));
}

#[test]
fn test_abandoned_jobs_cancel_their_handles() {
    let pool = make_pool(1, 8);
    let release = occupy_worker(&pool);
    let queued: Vec<_> = (0..3).map(|i| pool.submit(move || i).unwrap()).collect();

    let abandoned = pool.shutdown_now();
    assert_eq!(abandoned.len(), 3);
    drop(abandoned);
    for handle in &queued {
        assert_eq!(handle.join(), Err(SchedulerError::Cancelled));
    }

    release.send(()).unwrap();
    assert!(pool.await_termination(Duration::from_secs(5)));
    assert!(pool.is_terminated());
}

#[tokio::test]
async fn test_get_async_does_not_block_runtime() {
    let pool = make_pool(2, 8);
    let handle = pool
        .submit(|| {
            thread::sleep(Duration::from_millis(20));
            99_u64
        })
        .unwrap();

    let ticker = tokio::spawn(async {
        tokio::time::sleep(Duration::from_millis(1)).await;
        "ticked"
    });
    assert_eq!(handle.get_async(Duration::from_secs(5)).await.unwrap(), 99);
    assert_eq!(ticker.await.unwrap(), "ticked");
    pool.shutdown();
}

//! Tests for utility modules

use prometheus_scheduled_pool::util::{deadline_after, deadline_from, init_tracing, nanos_until, now};
use prometheus_scheduled_pool::Monitor;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[test]
fn test_deadline_helpers() {
    let start = now();
    let deadline = deadline_from(start, Duration::from_millis(10));
    assert_eq!(nanos_until(deadline, start), 10_000_000);
    assert!(deadline_after(Duration::ZERO) >= start);
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    tracing::info!("tracing initialized twice without panicking");
}

#[test]
fn test_monitor_handoff_between_threads() {
    let monitor = Arc::new(Monitor::new(None::<u32>));
    let producer = {
        let monitor = Arc::clone(&monitor);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            *monitor.lock() = Some(11);
            monitor.notify_all();
        })
    };

    let mut slot = monitor.lock();
    monitor.wait_while(&mut slot, |value| value.is_none());
    assert_eq!(*slot, Some(11));
    drop(slot);
    producer.join().unwrap();
}

#[test]
fn test_monitor_timed_wait_reports_timeout() {
    let monitor = Monitor::new(0_u8);
    let mut guard = monitor.lock();
    assert!(monitor.wait_for(&mut guard, Duration::from_millis(5)));
}

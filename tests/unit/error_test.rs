//! Tests for error types

use prometheus_scheduled_pool::core::{RingFull, SchedulerError};

#[test]
fn test_queue_full_error() {
    let err = SchedulerError::QueueFull("test_pool".to_string());
    assert_eq!(format!("{err}"), "queue full: test_pool");
}

#[test]
fn test_timeout_error() {
    assert_eq!(format!("{}", SchedulerError::Timeout), "operation timed out");
}

#[test]
fn test_cancelled_error() {
    assert_eq!(format!("{}", SchedulerError::Cancelled), "task cancelled");
}

#[test]
fn test_invalid_config_error() {
    let err = SchedulerError::InvalidConfig("worker_count must be greater than 0".to_string());
    assert_eq!(
        format!("{err}"),
        "invalid configuration: worker_count must be greater than 0"
    );
}

#[test]
fn test_internal_error() {
    let err = SchedulerError::Internal("spawn failed".to_string());
    assert_eq!(format!("{err}"), "internal error: spawn failed");
}

#[test]
fn test_scheduler_error_is_std_error() {
    let err: Box<dyn std::error::Error + Send + Sync> = Box::new(SchedulerError::PoolShutdown);
    assert_eq!(err.to_string(), "pool has been shut down");
}

#[test]
fn test_ring_full_converts_into_anyhow() {
    let err: anyhow::Error = RingFull(5_u32).into();
    assert_eq!(err.to_string(), "ring buffer is full");
}

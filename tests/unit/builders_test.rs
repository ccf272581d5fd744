//! Tests for builder modules

use prometheus_scheduled_pool::builders::{build_scheduled_pools, PoolBuilder};
use prometheus_scheduled_pool::config::{ScheduledPoolConfig, SchedulerConfig, ShutdownPolicy};
use prometheus_scheduled_pool::core::SchedulerError;
use std::collections::HashMap;
use std::time::Duration;

#[test]
fn test_pool_builder_defaults() {
    let builder = PoolBuilder::new("pool1", ScheduledPoolConfig::with_workers(3));
    assert_eq!(builder.name(), "pool1");
    assert_eq!(builder.config().workers.worker_count, 3);
    assert_eq!(builder.config().policy, ShutdownPolicy::default());
}

#[test]
fn test_pool_builder_thread_names() {
    let builder = PoolBuilder::new("timers", ScheduledPoolConfig::default())
        .with_worker_count(1)
        .with_thread_names_from_pool_name();
    assert_eq!(builder.config().workers.thread_name_prefix, "timers");
    assert_eq!(builder.config().dispatcher_thread_name, "timers-dispatcher");

    let pool = builder.build().unwrap();
    let handle = pool
        .submit(|| std::thread::current().name().map(str::to_string))
        .unwrap();
    assert_eq!(
        handle.get(Duration::from_secs(5)).unwrap().as_deref(),
        Some("timers-0")
    );
    pool.shutdown();
}

#[test]
fn test_build_scheduled_pools_from_config() {
    let mut pools = HashMap::new();
    pools.insert("fast".to_string(), ScheduledPoolConfig::with_workers(1));
    pools.insert("slow".to_string(), ScheduledPoolConfig::with_workers(2));

    let built = build_scheduled_pools(&SchedulerConfig { pools }).unwrap();
    assert_eq!(built.len(), 2);
    assert_eq!(built["slow"].worker_stats().worker_count, 2);
    for pool in built.values() {
        drop(pool.shutdown_now());
    }
}

#[test]
fn test_build_scheduled_pools_rejects_invalid_config() {
    let mut pools = HashMap::new();
    pools.insert("broken".to_string(), ScheduledPoolConfig::with_workers(0));
    let result = build_scheduled_pools(&SchedulerConfig { pools });
    assert!(matches!(result, Err(SchedulerError::InvalidConfig(_))));
}

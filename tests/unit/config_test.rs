//! Tests for configuration validation

use prometheus_scheduled_pool::config::{
    ScheduledPoolConfig, SchedulerConfig, ShutdownPolicy, WorkerPoolConfig,
};

#[test]
fn test_worker_pool_config_validation() {
    let valid = WorkerPoolConfig::new().with_worker_count(2).with_max_queue_depth(8);
    assert!(valid.validate().is_ok());
}

#[test]
fn test_worker_pool_config_invalid_worker_count() {
    let invalid = WorkerPoolConfig::new().with_worker_count(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_worker_pool_config_invalid_queue_depth() {
    let invalid = WorkerPoolConfig::new().with_max_queue_depth(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_worker_pool_config_invalid_stack_size() {
    let invalid = WorkerPoolConfig::new().with_thread_stack_size(1024);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduled_pool_config_rejects_blank_dispatcher_name() {
    let mut cfg = ScheduledPoolConfig::with_workers(1);
    cfg.dispatcher_thread_name = "  ".into();
    assert!(cfg.validate().is_err());
}

#[test]
fn test_scheduler_config_validation() {
    let json = r#"{
        "pools": {
            "timers": {
                "workers": { "worker_count": 2, "max_queue_depth": 64 },
                "policy": { "remove_on_cancel": false }
            }
        }
    }"#;

    let cfg = SchedulerConfig::from_json_str(json).unwrap();
    let timers = &cfg.pools["timers"];
    assert_eq!(timers.workers.worker_count, 2);
    assert_eq!(timers.workers.max_queue_depth, 64);
    assert_eq!(timers.workers.thread_name_prefix, "pl-worker");
    assert!(!timers.policy.remove_on_cancel);
    assert!(!timers.policy.execute_existing_delayed_tasks_after_shutdown);
    assert_eq!(timers.dispatcher_thread_name, "pl-dispatcher");
}

#[test]
fn test_scheduler_config_requires_a_pool() {
    assert!(SchedulerConfig::from_json_str(r#"{ "pools": {} }"#).is_err());
}

#[test]
fn test_scheduler_config_rejects_invalid_pool() {
    let json = r#"{ "pools": { "bad": { "workers": { "worker_count": 0 } } } }"#;
    let err = SchedulerConfig::from_json_str(json).unwrap_err();
    assert!(err.contains("bad"));
}

#[test]
fn test_policy_round_trips_through_json() {
    let policy = ShutdownPolicy {
        continue_existing_periodic_tasks_after_shutdown: true,
        ..ShutdownPolicy::default()
    };
    let json = serde_json::to_string(&policy).unwrap();
    let back: ShutdownPolicy = serde_json::from_str(&json).unwrap();
    assert_eq!(back, policy);
}

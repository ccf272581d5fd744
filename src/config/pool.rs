//! Worker pool and scheduled pool configuration structures.

use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::core::AppResult;

/// Smallest stack accepted for worker threads.
const MIN_STACK_SIZE: usize = 64 * 1024;

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Maximum jobs waiting for a worker.
    pub max_queue_depth: usize,
    /// Stack size of each worker thread, in bytes.
    pub thread_stack_size: usize,
    /// Prefix for worker thread names (`{prefix}-{index}`).
    pub thread_name_prefix: String,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get().max(1),
            max_queue_depth: 1024,
            thread_stack_size: 2 * 1024 * 1024,
            thread_name_prefix: "pl-worker".into(),
        }
    }
}

impl WorkerPoolConfig {
    /// Default configuration: one worker per logical CPU.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the maximum number of queued jobs.
    #[must_use]
    pub const fn with_max_queue_depth(mut self, max_queue_depth: usize) -> Self {
        self.max_queue_depth = max_queue_depth;
        self
    }

    /// Set the worker thread stack size in bytes.
    #[must_use]
    pub const fn with_thread_stack_size(mut self, thread_stack_size: usize) -> Self {
        self.thread_stack_size = thread_stack_size;
        self
    }

    /// Set the worker thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Validate worker pool configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.worker_count == 0 {
            return Err("worker_count must be greater than 0".into());
        }
        if self.max_queue_depth == 0 {
            return Err("max_queue_depth must be greater than 0".into());
        }
        if self.thread_stack_size < MIN_STACK_SIZE {
            return Err(format!("thread_stack_size must be at least {MIN_STACK_SIZE} bytes"));
        }
        if self.thread_name_prefix.trim().is_empty() {
            return Err("thread_name_prefix must not be empty".into());
        }
        Ok(())
    }
}

/// What happens to queued work once shutdown is requested, and on cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownPolicy {
    /// Keep rescheduling periodic tasks after `shutdown()`.
    pub continue_existing_periodic_tasks_after_shutdown: bool,
    /// Still run already-queued delayed tasks after `shutdown()`.
    pub execute_existing_delayed_tasks_after_shutdown: bool,
    /// Remove a cancelled task from the work queue immediately.
    pub remove_on_cancel: bool,
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        Self {
            continue_existing_periodic_tasks_after_shutdown: false,
            execute_existing_delayed_tasks_after_shutdown: false,
            remove_on_cancel: true,
        }
    }
}

/// Scheduled thread pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduledPoolConfig {
    /// Worker pool that runs due tasks.
    pub workers: WorkerPoolConfig,
    /// Shutdown and cancellation policy.
    pub policy: ShutdownPolicy,
    /// Name of the dispatcher thread.
    pub dispatcher_thread_name: String,
}

impl Default for ScheduledPoolConfig {
    fn default() -> Self {
        Self {
            workers: WorkerPoolConfig::default(),
            policy: ShutdownPolicy::default(),
            dispatcher_thread_name: "pl-dispatcher".into(),
        }
    }
}

impl ScheduledPoolConfig {
    /// Default configuration with `worker_count` workers.
    #[must_use]
    pub fn with_workers(worker_count: usize) -> Self {
        Self {
            workers: WorkerPoolConfig::new().with_worker_count(worker_count),
            ..Self::default()
        }
    }

    /// Replace the shutdown policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Validate the worker pool section and dispatcher settings.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        self.workers.validate()?;
        if self.dispatcher_thread_name.trim().is_empty() {
            return Err("dispatcher_thread_name must not be empty".into());
        }
        Ok(())
    }

    /// Load configuration from `SCHED_*` environment variables, reading a
    /// `.env` file first when one is present.
    ///
    /// Recognized variables: `SCHED_WORKER_COUNT`, `SCHED_MAX_QUEUE_DEPTH`,
    /// `SCHED_THREAD_STACK_SIZE`, `SCHED_THREAD_NAME_PREFIX`,
    /// `SCHED_CONTINUE_PERIODIC_AFTER_SHUTDOWN`,
    /// `SCHED_EXECUTE_DELAYED_AFTER_SHUTDOWN`, `SCHED_REMOVE_ON_CANCEL`.
    ///
    /// # Errors
    ///
    /// Fails when a variable cannot be parsed or the result is invalid.
    pub fn from_env() -> AppResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable lookup.
    ///
    /// # Errors
    ///
    /// Fails when a variable cannot be parsed or the result is invalid.
    pub fn from_vars<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let workers = &mut cfg.workers;
        let policy = &mut cfg.policy;

        parse_var(&lookup, "SCHED_WORKER_COUNT", &mut workers.worker_count)?;
        parse_var(&lookup, "SCHED_MAX_QUEUE_DEPTH", &mut workers.max_queue_depth)?;
        parse_var(&lookup, "SCHED_THREAD_STACK_SIZE", &mut workers.thread_stack_size)?;
        if let Some(prefix) = lookup("SCHED_THREAD_NAME_PREFIX") {
            workers.thread_name_prefix = prefix;
        }
        parse_var(
            &lookup,
            "SCHED_CONTINUE_PERIODIC_AFTER_SHUTDOWN",
            &mut policy.continue_existing_periodic_tasks_after_shutdown,
        )?;
        parse_var(
            &lookup,
            "SCHED_EXECUTE_DELAYED_AFTER_SHUTDOWN",
            &mut policy.execute_existing_delayed_tasks_after_shutdown,
        )?;
        parse_var(&lookup, "SCHED_REMOVE_ON_CANCEL", &mut policy.remove_on_cancel)?;

        cfg.validate().map_err(|e| anyhow!("environment configuration invalid: {e}"))?;
        Ok(cfg)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, slot: &mut T) -> AppResult<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(raw) = lookup(key) {
        *slot = raw
            .trim()
            .parse()
            .with_context(|| format!("failed to parse {key}={raw:?}"))?;
    }
    Ok(())
}

/// Root configuration: named scheduled pools.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Map of pool name to configuration.
    pub pools: HashMap<String, ScheduledPoolConfig>,
}

impl SchedulerConfig {
    /// Validate all pools and ensure at least one pool exists.
    ///
    /// # Errors
    ///
    /// Returns the first invalid pool and why.
    pub fn validate(&self) -> Result<(), String> {
        if self.pools.is_empty() {
            return Err("at least one pool must be defined".into());
        }
        for (name, pool) in &self.pools {
            pool.validate()
                .map_err(|e| format!("pool `{name}` invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON or invalid values.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            ("SCHED_WORKER_COUNT", "3"),
            ("SCHED_MAX_QUEUE_DEPTH", "16"),
            ("SCHED_REMOVE_ON_CANCEL", "false"),
            ("SCHED_EXECUTE_DELAYED_AFTER_SHUTDOWN", " true "),
        ]
        .into_iter()
        .collect();

        let cfg = ScheduledPoolConfig::from_vars(|k| vars.get(k).map(ToString::to_string)).unwrap();
        assert_eq!(cfg.workers.worker_count, 3);
        assert_eq!(cfg.workers.max_queue_depth, 16);
        assert!(!cfg.policy.remove_on_cancel);
        assert!(cfg.policy.execute_existing_delayed_tasks_after_shutdown);
        assert!(!cfg.policy.continue_existing_periodic_tasks_after_shutdown);
    }

    #[test]
    fn test_from_vars_rejects_garbage() {
        let err = ScheduledPoolConfig::from_vars(|k| {
            (k == "SCHED_WORKER_COUNT").then(|| "many".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("SCHED_WORKER_COUNT"));
    }

    #[test]
    fn test_from_vars_rejects_zero_workers() {
        let result =
            ScheduledPoolConfig::from_vars(|k| (k == "SCHED_WORKER_COUNT").then(|| "0".into()));
        assert!(result.is_err());
    }

    #[test]
    fn test_default_policy_matches_documented_defaults() {
        let policy = ShutdownPolicy::default();
        assert!(!policy.continue_existing_periodic_tasks_after_shutdown);
        assert!(!policy.execute_existing_delayed_tasks_after_shutdown);
        assert!(policy.remove_on_cancel);
    }
}

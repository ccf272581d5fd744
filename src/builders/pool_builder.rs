//! Builders to construct scheduled thread pools from configuration.

use std::collections::HashMap;

use tracing::info;

use crate::config::{ScheduledPoolConfig, SchedulerConfig, ShutdownPolicy};
use crate::core::{ScheduledThreadPool, SchedulerError};

/// Named builder for a single [`ScheduledThreadPool`].
#[derive(Debug, Clone)]
pub struct PoolBuilder {
    name: String,
    config: ScheduledPoolConfig,
}

impl PoolBuilder {
    /// Start from an existing configuration.
    pub fn new(name: impl Into<String>, config: ScheduledPoolConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    /// Pool name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration the pool will be built with.
    #[must_use]
    pub const fn config(&self) -> &ScheduledPoolConfig {
        &self.config
    }

    /// Override the worker count.
    #[must_use]
    pub const fn with_worker_count(mut self, worker_count: usize) -> Self {
        self.config.workers.worker_count = worker_count;
        self
    }

    /// Override the shutdown policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.config.policy = policy;
        self
    }

    /// Name worker threads `{name}-{index}` and the dispatcher `{name}-dispatcher`.
    #[must_use]
    pub fn with_thread_names_from_pool_name(mut self) -> Self {
        self.config.workers.thread_name_prefix.clone_from(&self.name);
        self.config.dispatcher_thread_name = format!("{}-dispatcher", self.name);
        self
    }

    /// Start the pool.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or a thread cannot be spawned.
    pub fn build(self) -> Result<ScheduledThreadPool, SchedulerError> {
        let pool = ScheduledThreadPool::new(self.config)?;
        info!(pool = %self.name, "Scheduled pool built");
        Ok(pool)
    }
}

/// Build every pool named in `cfg`; threads are named after their pool.
///
/// # Errors
///
/// Fails on invalid configuration or when any pool cannot start. Pools
/// already started are shut down when the map is dropped.
pub fn build_scheduled_pools(
    cfg: &SchedulerConfig,
) -> Result<HashMap<String, ScheduledThreadPool>, SchedulerError> {
    cfg.validate()
        .map_err(|e| SchedulerError::InvalidConfig(format!("config invalid: {e}")))?;

    let mut pools = HashMap::with_capacity(cfg.pools.len());
    for (name, pool_cfg) in &cfg.pools {
        let pool = PoolBuilder::new(name.clone(), pool_cfg.clone())
            .with_thread_names_from_pool_name()
            .build()?;
        pools.insert(name.clone(), pool);
    }

    Ok(pools)
}

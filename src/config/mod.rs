//! Configuration models for worker pools, scheduled pools and shutdown policy.

pub mod pool;

pub use pool::{SchedulerConfig, ScheduledPoolConfig, ShutdownPolicy, WorkerPoolConfig};

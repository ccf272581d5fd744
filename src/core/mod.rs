//! Worker pool, one-shot tasks and the deadline-ordered scheduled pool.

pub mod error;
pub mod future_task;
pub mod scheduled;
pub mod worker_pool;

pub use error::{AppResult, RingFull, SchedulerError};
pub use future_task::{FutureTask, Job, TaskHandle, TaskId};
pub use scheduled::{PoolState, ScheduledHandle, ScheduledTask, ScheduledThreadPool};
pub use worker_pool::{PoolStats, WorkerPool};

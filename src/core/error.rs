//! Error types for ring buffers, pools and scheduled tasks.

use thiserror::Error;

/// Errors produced by the worker pool, the scheduled pool and task handles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The worker queue is full.
    #[error("queue full: {0}")]
    QueueFull(String),
    /// The pool no longer accepts work.
    #[error("pool has been shut down")]
    PoolShutdown,
    /// The result did not become available in time.
    #[error("operation timed out")]
    Timeout,
    /// The task was cancelled, or abandoned before it could run.
    #[error("task cancelled")]
    Cancelled,
    /// The task panicked while running.
    #[error("task panicked: {0}")]
    TaskPanicked(String),
    /// The result was already taken through another call.
    #[error("result already taken")]
    ResultTaken,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Internal failure with context (thread spawn, channel closed, ...).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A rejected `put` on a full ring buffer; carries the item back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("ring buffer is full")]
pub struct RingFull<T>(pub T);

impl<T> RingFull<T> {
    /// Recovers the rejected item.
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;

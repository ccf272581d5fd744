//! One-shot units of work and the handles that observe them.
//!
//! A [`FutureTask`] owns a closure; its [`TaskHandle`] shares a completion slot
//! with it. Whoever runs the task (a worker thread, the caller after
//! `shutdown_now`, ...) fills the slot, and waiters on the handle are woken
//! through the slot's [`Monitor`]. No polling anywhere.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::SchedulerError;
use crate::monitor::Monitor;
use crate::util::clock;

/// Unique task identifier.
pub type TaskId = u64;

/// A type-erased unit of work as executed by worker threads.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate the next process-wide task id.
pub(crate) fn next_task_id() -> TaskId {
    NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed)
}

/// Render a panic payload for error reporting.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Lifecycle of a task's result.
enum Slot<R> {
    Pending,
    Running,
    Ready(R),
    Taken,
    Cancelled,
    Failed(String),
}

impl<R> Slot<R> {
    const fn is_done(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// Terminal outcome, moving a ready value out.
    fn settle(&mut self) -> Option<Result<R, SchedulerError>> {
        match self {
            Self::Pending | Self::Running => None,
            Self::Taken => Some(Err(SchedulerError::ResultTaken)),
            Self::Cancelled => Some(Err(SchedulerError::Cancelled)),
            Self::Failed(msg) => Some(Err(SchedulerError::TaskPanicked(msg.clone()))),
            Self::Ready(_) => match std::mem::replace(self, Self::Taken) {
                Self::Ready(value) => Some(Ok(value)),
                _ => None,
            },
        }
    }
}

/// Completion slot shared by a task and its handles.
pub(crate) struct Completion<R> {
    slot: Monitor<Slot<R>>,
}

impl<R> Completion<R> {
    pub(crate) const fn new() -> Self {
        Self {
            slot: Monitor::new(Slot::Pending),
        }
    }

    /// Pending -> Cancelled. Returns whether this call cancelled the task.
    pub(crate) fn cancel(&self) -> bool {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Pending) {
            *slot = Slot::Cancelled;
            drop(slot);
            self.slot.notify_all();
            true
        } else {
            false
        }
    }

    /// Pending -> Running. Returns `false` if the task must not run.
    pub(crate) fn begin(&self) -> bool {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Pending) {
            *slot = Slot::Running;
            true
        } else {
            false
        }
    }

    /// Record the final outcome and wake every waiter.
    pub(crate) fn finish(&self, outcome: Result<R, String>) {
        let mut slot = self.slot.lock();
        if slot.is_done() {
            return;
        }
        *slot = match outcome {
            Ok(value) => Slot::Ready(value),
            Err(msg) => Slot::Failed(msg),
        };
        drop(slot);
        self.slot.notify_all();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        matches!(*self.slot.lock(), Slot::Cancelled)
    }

    pub(crate) fn is_done(&self) -> bool {
        self.slot.lock().is_done()
    }

    fn try_take(&self) -> Option<Result<R, SchedulerError>> {
        self.slot.lock().settle()
    }

    fn wait(&self, deadline: Option<Instant>) -> Result<R, SchedulerError> {
        let mut slot = self.slot.lock();
        loop {
            if let Some(outcome) = slot.settle() {
                return outcome;
            }
            match deadline {
                Some(deadline) => {
                    if self.slot.wait_until(&mut slot, deadline) {
                        return slot.settle().unwrap_or(Err(SchedulerError::Timeout));
                    }
                }
                None => self.slot.wait(&mut slot),
            }
        }
    }
}

/// A closure waiting to be run, paired with the handle that observes it.
///
/// Dropping a `FutureTask` that never ran completes its handle as cancelled,
/// so no waiter is left parked on work that was abandoned.
pub struct FutureTask<R> {
    id: TaskId,
    func: Option<Box<dyn FnOnce() -> R + Send>>,
    completion: Arc<Completion<R>>,
}

impl<R: Send + 'static> FutureTask<R> {
    /// Wrap `f` and return the task together with its handle.
    ///
    /// # Example
    ///
    /// ```
    /// use prometheus_scheduled_pool::core::FutureTask;
    /// use std::time::Duration;
    ///
    /// let (task, handle) = FutureTask::new(|| 6 * 7);
    /// task.run();
    /// assert_eq!(handle.get(Duration::from_secs(1)).unwrap(), 42);
    /// ```
    pub fn new<F>(f: F) -> (Self, TaskHandle<R>)
    where
        F: FnOnce() -> R + Send + 'static,
    {
        Self::with_id(next_task_id(), f)
    }

    pub(crate) fn with_id<F>(id: TaskId, f: F) -> (Self, TaskHandle<R>)
    where
        F: FnOnce() -> R + Send + 'static,
    {
        let completion = Arc::new(Completion::new());
        let handle = TaskHandle {
            id,
            completion: Arc::clone(&completion),
        };
        (
            Self {
                id,
                func: Some(Box::new(f)),
                completion,
            },
            handle,
        )
    }

    /// Erase the task into a [`Job`] for a worker queue.
    pub fn into_job(self) -> Job {
        Box::new(move || self.run())
    }
}

impl<R> FutureTask<R> {
    /// Task identifier shared with the handle.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Whether the handle cancelled the task before it ran.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.completion.is_cancelled()
    }

    /// Run the closure unless the task was cancelled, store its value and wake
    /// waiters.
    ///
    /// # Panics
    ///
    /// A panic inside the closure is recorded on the handle as
    /// [`SchedulerError::TaskPanicked`] and then resumed, so the caller sees it too.
    pub fn run(mut self) {
        let Some(func) = self.func.take() else {
            return;
        };
        if !self.completion.begin() {
            return;
        }
        match panic::catch_unwind(AssertUnwindSafe(func)) {
            Ok(value) => self.completion.finish(Ok(value)),
            Err(payload) => {
                self.completion.finish(Err(panic_message(payload.as_ref())));
                panic::resume_unwind(payload);
            }
        }
    }
}

impl<R> Drop for FutureTask<R> {
    fn drop(&mut self) {
        if self.func.is_some() {
            self.completion.cancel();
        }
    }
}

impl<R> fmt::Debug for FutureTask<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureTask")
            .field("id", &self.id)
            .field("ran", &self.func.is_none())
            .finish()
    }
}

/// Observer of a [`FutureTask`]: wait for its value or cancel it.
///
/// Handles are cheap to clone; the value itself can be taken only once.
pub struct TaskHandle<R> {
    id: TaskId,
    completion: Arc<Completion<R>>,
}

impl<R> TaskHandle<R> {
    pub(crate) const fn from_parts(id: TaskId, completion: Arc<Completion<R>>) -> Self {
        Self { id, completion }
    }

    /// Task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Cancel the task if it has not started. Returns whether it was cancelled
    /// by this call.
    pub fn cancel(&self) -> bool {
        self.completion.cancel()
    }

    /// Whether the task was cancelled (or abandoned) before running.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.completion.is_cancelled()
    }

    /// Whether the task reached a terminal state.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.completion.is_done()
    }

    /// Take the outcome if the task already finished, without blocking.
    #[must_use]
    pub fn try_get(&self) -> Option<Result<R, SchedulerError>> {
        self.completion.try_take()
    }

    /// Block until the task finishes or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// - `Timeout` if the task is still pending or running at the deadline
    /// - `Cancelled` if it was cancelled or abandoned
    /// - `TaskPanicked` if the closure panicked
    /// - `ResultTaken` if the value was already taken
    pub fn get(&self, timeout: Duration) -> Result<R, SchedulerError> {
        self.completion.wait(Some(clock::deadline_after(timeout)))
    }

    /// Block until the task finishes, however long that takes.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get), except it never times out.
    pub fn join(&self) -> Result<R, SchedulerError> {
        self.completion.wait(None)
    }
}

#[cfg(feature = "tokio-runtime")]
impl<R: Send + 'static> TaskHandle<R> {
    /// Async variant of [`get`](Self::get).
    ///
    /// The condvar wait runs on Tokio's blocking pool so the async runtime is
    /// never stalled.
    ///
    /// # Errors
    ///
    /// Same as [`get`](Self::get), plus `Internal` if the blocking task failed.
    pub async fn get_async(&self, timeout: Duration) -> Result<R, SchedulerError> {
        let handle = self.clone();
        tokio::task::spawn_blocking(move || handle.get(timeout))
            .await
            .map_err(|e| SchedulerError::Internal(format!("blocking wait failed: {e}")))?
    }
}

impl<R> Clone for TaskHandle<R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            completion: Arc::clone(&self.completion),
        }
    }
}

impl<R> fmt::Debug for TaskHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.id)
            .field("done", &self.is_done())
            .finish()
    }
}

//! Queue entries and the handles callers keep for them.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use super::work_queue::QueueKey;
use super::Shared;
use crate::core::future_task::{panic_message, Completion, FutureTask, Job, TaskHandle, TaskId};
use crate::core::SchedulerError;
use crate::util::clock;

/// Current queue position of a task, shared with its handle.
pub(crate) type KeySlot = Arc<Mutex<Option<QueueKey>>>;

/// Object-safe view of a one-shot [`FutureTask`] with any result type.
pub(crate) trait Runnable: Send {
    fn run_boxed(self: Box<Self>);
    fn cancelled(&self) -> bool;
}

impl<R: Send + 'static> Runnable for FutureTask<R> {
    fn run_boxed(self: Box<Self>) {
        (*self).run();
    }

    fn cancelled(&self) -> bool {
        self.is_cancelled()
    }
}

/// How the next deadline of a periodic task is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Period {
    /// Previous deadline plus the period, regardless of run time.
    FixedRate(Duration),
    /// Completion time of the previous run plus the delay.
    FixedDelay(Duration),
}

impl Period {
    fn next_deadline(self, scheduled: Instant, finished: Instant) -> Instant {
        match self {
            Self::FixedRate(period) => clock::deadline_from(scheduled, period),
            Self::FixedDelay(delay) => clock::deadline_from(finished, delay),
        }
    }
}

/// A closure re-run until cancelled, shared by every queue entry of the series.
pub(crate) struct PeriodicTask {
    id: TaskId,
    func: Mutex<Box<dyn FnMut() + Send>>,
    period: Period,
    /// Never completes normally: it ends cancelled or failed.
    completion: Arc<Completion<()>>,
}

impl PeriodicTask {
    pub fn new<F>(id: TaskId, func: F, period: Period) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self {
            id,
            func: Mutex::new(Box::new(func)),
            period,
            completion: Arc::new(Completion::new()),
        }
    }

    pub fn handle(&self) -> TaskHandle<()> {
        TaskHandle::from_parts(self.id, Arc::clone(&self.completion))
    }

    fn is_cancelled(&self) -> bool {
        self.completion.is_cancelled()
    }

    /// One run. A panic marks the series failed and hands back the payload.
    fn run_once(&self) -> Result<(), Box<dyn Any + Send>> {
        let mut guard = self.func.lock();
        let func: &mut (dyn FnMut() + Send) = &mut **guard;
        panic::catch_unwind(AssertUnwindSafe(func)).map_err(|payload| {
            self.completion.finish(Err(panic_message(payload.as_ref())));
            payload
        })
    }
}

enum Body {
    Once(Box<dyn Runnable>),
    Periodic(Arc<PeriodicTask>),
}

/// A task waiting in the deadline-ordered queue.
///
/// Returned by [`shutdown_now`](super::ScheduledThreadPool::shutdown_now) for
/// every task that never reached a worker. Dropping one cancels its handle;
/// [`run`](Self::run) executes it once on the calling thread instead.
pub struct ScheduledTask {
    id: TaskId,
    deadline: Instant,
    key: KeySlot,
    body: Option<Body>,
}

impl ScheduledTask {
    pub(crate) fn one_shot<R: Send + 'static>(task: FutureTask<R>, deadline: Instant) -> Self {
        Self {
            id: task.id(),
            deadline,
            key: Arc::new(Mutex::new(None)),
            body: Some(Body::Once(Box::new(task))),
        }
    }

    pub(crate) fn periodic(task: Arc<PeriodicTask>, deadline: Instant, key: KeySlot) -> Self {
        Self {
            id: task.id,
            deadline,
            key,
            body: Some(Body::Periodic(task)),
        }
    }

    /// Task identifier, shared with its handle.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// When the task was due to be dispatched.
    #[must_use]
    pub const fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Whether this entry belongs to a fixed-rate or fixed-delay series.
    #[must_use]
    pub fn is_periodic(&self) -> bool {
        matches!(self.body, Some(Body::Periodic(_)))
    }

    /// Whether the task was cancelled through its handle.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        match &self.body {
            Some(Body::Once(task)) => task.cancelled(),
            Some(Body::Periodic(task)) => task.is_cancelled(),
            None => true,
        }
    }

    /// Run the task once on the calling thread.
    ///
    /// A periodic task is not rescheduled; its handle completes as cancelled
    /// after this run.
    ///
    /// # Panics
    ///
    /// Resumes a panic raised by the task, after recording it on the handle.
    pub fn run(mut self) {
        match self.body.take() {
            Some(Body::Once(task)) => task.run_boxed(),
            Some(Body::Periodic(task)) => {
                let outcome = if task.is_cancelled() {
                    Ok(())
                } else {
                    task.run_once()
                };
                task.completion.cancel();
                if let Err(payload) = outcome {
                    panic::resume_unwind(payload);
                }
            }
            None => {}
        }
    }

    pub(crate) fn set_key(&self, key: QueueKey) {
        *self.key.lock() = Some(key);
    }

    pub(crate) fn key_slot(&self) -> KeySlot {
        Arc::clone(&self.key)
    }

    /// Erase into a worker job. Periodic tasks reschedule themselves through
    /// `pool` after each run.
    pub(crate) fn into_job(self, pool: Weak<Shared>) -> Job {
        Box::new(move || self.run_in_pool(&pool))
    }

    fn run_in_pool(mut self, pool: &Weak<Shared>) {
        match self.body.take() {
            Some(Body::Once(task)) => task.run_boxed(),
            Some(Body::Periodic(task)) => {
                run_periodic(&task, self.deadline, &self.key, pool);
            }
            None => {}
        }
    }
}

fn run_periodic(task: &Arc<PeriodicTask>, scheduled: Instant, key: &KeySlot, pool: &Weak<Shared>) {
    let outcome = if task.is_cancelled() {
        Ok(false)
    } else {
        task.run_once().map(|()| true)
    };

    let shared = pool.upgrade();
    let next = match (&outcome, &shared) {
        (Ok(true), Some(shared)) if !task.is_cancelled() && shared.may_reschedule_periodic() => {
            let deadline = task.period.next_deadline(scheduled, clock::now());
            Some(ScheduledTask::periodic(Arc::clone(task), deadline, Arc::clone(key)))
        }
        _ => None,
    };

    if next.is_none() {
        // Series over: a no-op when already cancelled or failed.
        task.completion.cancel();
        debug!(task_id = task.id, "Periodic task not rescheduled");
    }
    if let Some(shared) = shared {
        shared.finish_periodic(next);
    }
    if let Err(payload) = outcome {
        panic::resume_unwind(payload);
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        // One-shot bodies cancel themselves through `FutureTask`'s own drop.
        if let Some(Body::Periodic(task)) = self.body.take() {
            task.completion.cancel();
        }
    }
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("id", &self.id)
            .field("deadline", &self.deadline)
            .field("periodic", &self.is_periodic())
            .finish_non_exhaustive()
    }
}

/// Handle to a scheduled task: inspect, cancel, or wait for its result.
///
/// For periodic tasks `get`/`join` only return once the series ends, with
/// `Cancelled` after a cancel or shutdown and `TaskPanicked` if a run panicked.
pub struct ScheduledHandle<R> {
    task: TaskHandle<R>,
    key: KeySlot,
    first_deadline: Instant,
    periodic: bool,
    pool: Weak<Shared>,
}

impl<R> ScheduledHandle<R> {
    pub(crate) const fn new(
        task: TaskHandle<R>,
        key: KeySlot,
        first_deadline: Instant,
        periodic: bool,
        pool: Weak<Shared>,
    ) -> Self {
        Self {
            task,
            key,
            first_deadline,
            periodic,
            pool,
        }
    }

    /// Task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.task.id()
    }

    /// Deadline of the next (or last) dispatch.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.key.lock().map_or(self.first_deadline, |key| key.deadline)
    }

    /// Time left until [`deadline`](Self::deadline); zero once due.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.deadline().saturating_duration_since(clock::now())
    }

    /// Whether the task repeats.
    #[must_use]
    pub const fn is_periodic(&self) -> bool {
        self.periodic
    }

    /// Cancel the task unless it already started (one-shot) or ended
    /// (periodic). With `remove_on_cancel` the queue entry is dropped at once;
    /// otherwise the dispatcher discards it when it comes due.
    ///
    /// Returns whether this call cancelled the task.
    pub fn cancel(&self) -> bool {
        if !self.task.cancel() {
            return false;
        }
        if let Some(shared) = self.pool.upgrade() {
            if shared.remove_on_cancel() {
                let key = *self.key.lock();
                if let Some(key) = key {
                    drop(shared.queue.remove(key));
                }
            }
        }
        debug!(task_id = self.id(), "Scheduled task cancelled");
        true
    }

    /// Whether the task was cancelled (or abandoned by `shutdown_now`).
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.task.is_cancelled()
    }

    /// Whether the task reached a terminal state.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.task.is_done()
    }

    /// Block until the task finishes or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// See [`TaskHandle::get`].
    pub fn get(&self, timeout: Duration) -> Result<R, SchedulerError> {
        self.task.get(timeout)
    }

    /// Block until the task finishes.
    ///
    /// # Errors
    ///
    /// See [`TaskHandle::join`].
    pub fn join(&self) -> Result<R, SchedulerError> {
        self.task.join()
    }

    /// The underlying task handle, e.g. for [`TaskHandle::get_async`].
    #[must_use]
    pub const fn task_handle(&self) -> &TaskHandle<R> {
        &self.task
    }
}

impl<R> Clone for ScheduledHandle<R> {
    fn clone(&self) -> Self {
        Self {
            task: self.task.clone(),
            key: Arc::clone(&self.key),
            first_deadline: self.first_deadline,
            periodic: self.periodic,
            pool: Weak::clone(&self.pool),
        }
    }
}

impl<R> fmt::Debug for ScheduledHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledHandle")
            .field("id", &self.id())
            .field("deadline", &self.deadline())
            .field("periodic", &self.periodic)
            .field("done", &self.is_done())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fixed_rate_uses_previous_deadline() {
        let start = clock::now();
        let finished = start + Duration::from_millis(30);
        let period = Period::FixedRate(Duration::from_millis(10));
        assert_eq!(
            period.next_deadline(start, finished),
            start + Duration::from_millis(10)
        );
    }

    #[test]
    fn test_fixed_delay_uses_completion_time() {
        let start = clock::now();
        let finished = start + Duration::from_millis(30);
        let period = Period::FixedDelay(Duration::from_millis(10));
        assert_eq!(
            period.next_deadline(start, finished),
            finished + Duration::from_millis(10)
        );
    }

    #[test]
    fn test_dropping_periodic_entry_cancels_handle() {
        let periodic = Arc::new(PeriodicTask::new(1, || {}, Period::FixedRate(Duration::from_secs(1))));
        let handle = periodic.handle();
        let entry = ScheduledTask::periodic(periodic, clock::now(), Arc::new(Mutex::new(None)));
        assert!(entry.is_periodic());
        drop(entry);
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_run_periodic_entry_once_outside_pool() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let periodic = Arc::new(PeriodicTask::new(
            2,
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
            Period::FixedDelay(Duration::from_secs(1)),
        ));
        let handle = periodic.handle();
        ScheduledTask::periodic(periodic, clock::now(), Arc::new(Mutex::new(None))).run();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(handle.join(), Err(SchedulerError::Cancelled));
    }

    #[test]
    fn test_one_shot_entry_reports_cancellation() {
        let (task, handle) = FutureTask::new(|| 9);
        let entry = ScheduledTask::one_shot(task, clock::now());
        assert!(!entry.is_cancelled());
        handle.cancel();
        assert!(entry.is_cancelled());
    }
}

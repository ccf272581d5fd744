//! Scheduled thread pool: delayed and periodic tasks dispatched by deadline.
//!
//! A [`ScheduledThreadPool`] owns a deadline-ordered work queue, one
//! dispatcher thread and a [`WorkerPool`]. The dispatcher pops each task once
//! its deadline has passed and hands it to the workers; it never runs task
//! code itself.
//!
//! Lifecycle: `Running → ShuttingDown → Stopped`.
//!
//! # Example
//!
//! ```
//! use prometheus_scheduled_pool::core::ScheduledThreadPool;
//! use std::time::Duration;
//!
//! let pool = ScheduledThreadPool::with_workers(2).unwrap();
//! let handle = pool.schedule(|| "later", Duration::from_millis(10)).unwrap();
//! assert_eq!(handle.get(Duration::from_secs(5)).unwrap(), "later");
//! let pending = pool.shutdown_now();
//! assert!(pending.is_empty());
//! ```

mod dispatcher;
mod task;
mod work_queue;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::{ScheduledPoolConfig, ShutdownPolicy};
use crate::core::future_task::{next_task_id, FutureTask};
use crate::core::worker_pool::{PoolStats, WorkerPool};
use crate::core::SchedulerError;
use crate::monitor::Monitor;
use crate::util::clock;

pub use task::{ScheduledHandle, ScheduledTask};

use task::{Period, PeriodicTask};
use work_queue::WorkQueue;

/// Lifecycle state of a [`ScheduledThreadPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolState {
    /// Accepting and dispatching tasks.
    Running,
    /// No new tasks; queued work is drained (or being abandoned).
    ShuttingDown,
    /// The dispatcher has exited.
    Stopped,
}

/// State shared by the pool, its dispatcher and outstanding handles.
pub(crate) struct Shared {
    queue: WorkQueue,
    workers: WorkerPool,
    state: Monitor<PoolState>,
    shutting_down: AtomicBool,
    /// Raised by `shutdown_now`; the dispatcher checks it once per iteration.
    cancelled: AtomicBool,
    continue_periodic: AtomicBool,
    execute_delayed: AtomicBool,
    remove_on_cancel: AtomicBool,
}

impl Shared {
    fn remove_on_cancel(&self) -> bool {
        self.remove_on_cancel.load(Ordering::Acquire)
    }

    fn may_reschedule_periodic(&self) -> bool {
        !self.cancelled.load(Ordering::Acquire)
            && (!self.shutting_down.load(Ordering::Acquire)
                || self.continue_periodic.load(Ordering::Acquire))
    }

    /// Queue a freshly created task; rejected once shutdown started.
    fn enqueue(&self, task: ScheduledTask) -> Result<(), SchedulerError> {
        let rejected = {
            let mut queue = self.queue.lock();
            if self.shutting_down.load(Ordering::Acquire) {
                Some(task)
            } else {
                queue.push(task);
                None
            }
        };
        if rejected.is_some() {
            return Err(SchedulerError::PoolShutdown);
        }
        self.queue.wake_all();
        Ok(())
    }

    /// A periodic run finished; queue its next run if there is one.
    fn finish_periodic(&self, next: Option<ScheduledTask>) {
        let dropped = {
            let mut queue = self.queue.lock();
            queue.periodic_in_flight = queue.periodic_in_flight.saturating_sub(1);
            match next {
                Some(task) if !self.cancelled.load(Ordering::Acquire) => {
                    queue.push(task);
                    None
                }
                other => other,
            }
        };
        self.queue.wake_all();
        drop(dropped);
    }

    fn set_state(&self, next: PoolState) {
        *self.state.lock() = next;
        self.state.notify_all();
    }
}

/// Deadline-ordered task scheduler backed by a [`WorkerPool`].
///
/// Dropping a running pool calls [`shutdown_now`](Self::shutdown_now).
/// Dropping it after [`shutdown`](Self::shutdown) lets the graceful drain
/// finish in the background, unless periodic tasks were kept past shutdown;
/// those are stopped with `shutdown_now`.
pub struct ScheduledThreadPool {
    shared: Arc<Shared>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl ScheduledThreadPool {
    /// Start the worker threads and the dispatcher thread.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if the configuration is invalid
    /// - `Internal` if a thread cannot be spawned
    pub fn new(config: ScheduledPoolConfig) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;

        let worker_count = config.workers.worker_count;
        let workers = WorkerPool::new(config.workers)?;
        let shared = Arc::new(Shared {
            queue: WorkQueue::new(),
            workers,
            state: Monitor::new(PoolState::Running),
            shutting_down: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            continue_periodic: AtomicBool::new(
                config.policy.continue_existing_periodic_tasks_after_shutdown,
            ),
            execute_delayed: AtomicBool::new(
                config.policy.execute_existing_delayed_tasks_after_shutdown,
            ),
            remove_on_cancel: AtomicBool::new(config.policy.remove_on_cancel),
        });

        let handle = dispatcher::spawn(Arc::clone(&shared), &config.dispatcher_thread_name)
            .map_err(|e| {
                shared.workers.shutdown_now();
                SchedulerError::Internal(format!("failed to spawn dispatcher: {e}"))
            })?;

        info!(
            worker_count = worker_count,
            dispatcher = %config.dispatcher_thread_name,
            "Scheduled thread pool started"
        );

        Ok(Self {
            shared,
            dispatcher: Mutex::new(Some(handle)),
        })
    }

    /// Pool with `worker_count` workers and default settings.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub fn with_workers(worker_count: usize) -> Result<Self, SchedulerError> {
        Self::new(ScheduledPoolConfig::with_workers(worker_count))
    }

    /// Run `f` once `delay` has elapsed.
    ///
    /// # Errors
    ///
    /// `PoolShutdown` after `shutdown` or `shutdown_now`.
    pub fn schedule<F, R>(&self, f: F, delay: Duration) -> Result<ScheduledHandle<R>, SchedulerError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let deadline = clock::deadline_after(delay);
        let (task, handle) = FutureTask::new(f);
        let entry = ScheduledTask::one_shot(task, deadline);
        let key = entry.key_slot();
        let id = entry.id();

        self.shared.enqueue(entry)?;
        debug!(task_id = id, delay = ?delay, "Task scheduled");

        Ok(ScheduledHandle::new(handle, key, deadline, false, Arc::downgrade(&self.shared)))
    }

    /// Run `f` as soon as a worker is free.
    ///
    /// # Errors
    ///
    /// `PoolShutdown` after `shutdown` or `shutdown_now`.
    pub fn submit<F, R>(&self, f: F) -> Result<ScheduledHandle<R>, SchedulerError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.schedule(f, Duration::ZERO)
    }

    /// Fire-and-forget [`submit`](Self::submit).
    ///
    /// # Errors
    ///
    /// `PoolShutdown` after `shutdown` or `shutdown_now`.
    pub fn execute<F>(&self, f: F) -> Result<(), SchedulerError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(f).map(drop)
    }

    /// Run `f` after `initial_delay`, then every `period` measured from the
    /// previous deadline. A late run is followed by the next one immediately;
    /// runs never overlap.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if `period` is zero
    /// - `PoolShutdown` after `shutdown` or `shutdown_now`
    pub fn schedule_at_fixed_rate<F>(
        &self,
        f: F,
        initial_delay: Duration,
        period: Duration,
    ) -> Result<ScheduledHandle<()>, SchedulerError>
    where
        F: FnMut() + Send + 'static,
    {
        self.schedule_periodic(f, initial_delay, Period::FixedRate(period), period)
    }

    /// Run `f` after `initial_delay`, then again `delay` after each run completes.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if `delay` is zero
    /// - `PoolShutdown` after `shutdown` or `shutdown_now`
    pub fn schedule_with_fixed_delay<F>(
        &self,
        f: F,
        initial_delay: Duration,
        delay: Duration,
    ) -> Result<ScheduledHandle<()>, SchedulerError>
    where
        F: FnMut() + Send + 'static,
    {
        self.schedule_periodic(f, initial_delay, Period::FixedDelay(delay), delay)
    }

    fn schedule_periodic<F>(
        &self,
        f: F,
        initial_delay: Duration,
        period: Period,
        step: Duration,
    ) -> Result<ScheduledHandle<()>, SchedulerError>
    where
        F: FnMut() + Send + 'static,
    {
        if step.is_zero() {
            return Err(SchedulerError::InvalidConfig(
                "period must be greater than zero".into(),
            ));
        }

        let deadline = clock::deadline_after(initial_delay);
        let id = next_task_id();
        let periodic = Arc::new(PeriodicTask::new(id, f, period));
        let handle = periodic.handle();
        let key = Arc::new(Mutex::new(None));
        let entry = ScheduledTask::periodic(periodic, deadline, Arc::clone(&key));

        self.shared.enqueue(entry)?;
        debug!(task_id = id, period = ?period, "Periodic task scheduled");

        Ok(ScheduledHandle::new(handle, key, deadline, true, Arc::downgrade(&self.shared)))
    }

    /// Stop accepting tasks and let the dispatcher drain what the policy keeps.
    ///
    /// Queued periodic tasks are dropped unless
    /// `continue_existing_periodic_tasks_after_shutdown` is set; queued
    /// one-shot tasks are dropped unless
    /// `execute_existing_delayed_tasks_after_shutdown` is set. Dropped tasks'
    /// handles report `Cancelled`. Returns without waiting; see
    /// [`await_termination`](Self::await_termination).
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.state.lock();
            if *state != PoolState::Running {
                return;
            }
            *state = PoolState::ShuttingDown;
        }
        self.shared.state.notify_all();
        self.shared.shutting_down.store(true, Ordering::Release);

        let keep_periodic = self.continue_existing_periodic_tasks_after_shutdown();
        let keep_delayed = self.execute_existing_delayed_tasks_after_shutdown();

        let discarded: BTreeMap<_, _> = {
            let mut queue = self.shared.queue.lock();
            let (kept, discarded) = std::mem::take(&mut queue.entries)
                .into_iter()
                .partition(|(_, task)| {
                    !task.is_cancelled()
                        && if task.is_periodic() {
                            keep_periodic
                        } else {
                            keep_delayed
                        }
                });
            queue.entries = kept;
            discarded
        };
        self.shared.queue.wake_all();

        info!(discarded = discarded.len(), "Scheduled pool shutting down");
        drop(discarded);
    }

    /// Stop immediately.
    ///
    /// Raises the cancellation flag, shuts the worker pool down (jobs waiting
    /// for a worker are discarded, running ones finish), wakes the dispatcher
    /// and joins it. Returns the tasks still in the work queue, earliest
    /// deadline first; dropping them cancels their handles.
    pub fn shutdown_now(&self) -> Vec<ScheduledTask> {
        self.shared.shutting_down.store(true, Ordering::Release);
        self.shared.cancelled.store(true, Ordering::Release);
        {
            let mut state = self.shared.state.lock();
            if *state == PoolState::Running {
                *state = PoolState::ShuttingDown;
            }
        }

        let discarded = self.shared.workers.shutdown_now();
        if !discarded.is_empty() {
            debug!(count = discarded.len(), "Discarded tasks waiting for a worker");
        }
        drop(discarded);

        let pending = self.shared.queue.drain();
        self.shared.state.notify_all();

        self.join_dispatcher();
        self.shared.set_state(PoolState::Stopped);

        info!(pending = pending.len(), "Scheduled pool stopped");
        pending
    }

    /// Wait up to `timeout` for the dispatcher and every worker to exit.
    ///
    /// Returns `true` if the pool terminated in time.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = clock::deadline_after(timeout);
        {
            let mut state = self.shared.state.lock();
            while *state != PoolState::Stopped {
                if self.shared.state.wait_until(&mut state, deadline)
                    && *state != PoolState::Stopped
                {
                    return false;
                }
            }
        }
        self.join_dispatcher();
        self.shared
            .workers
            .await_termination(deadline.saturating_duration_since(clock::now()))
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PoolState {
        *self.shared.state.lock()
    }

    /// Whether `shutdown` or `shutdown_now` was called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shared.shutting_down.load(Ordering::Acquire)
    }

    /// Whether the dispatcher and all workers have exited.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.state() == PoolState::Stopped && self.shared.workers.is_terminated()
    }

    /// Tasks waiting in the work queue, cancelled-but-not-removed ones included.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.shared.queue.len()
    }

    /// Statistics of the underlying worker pool.
    #[must_use]
    pub fn worker_stats(&self) -> PoolStats {
        self.shared.workers.stats()
    }

    /// Snapshot of the shutdown and cancellation policy.
    #[must_use]
    pub fn policy(&self) -> ShutdownPolicy {
        ShutdownPolicy {
            continue_existing_periodic_tasks_after_shutdown: self
                .continue_existing_periodic_tasks_after_shutdown(),
            execute_existing_delayed_tasks_after_shutdown: self
                .execute_existing_delayed_tasks_after_shutdown(),
            remove_on_cancel: self.remove_on_cancel(),
        }
    }

    /// Whether periodic tasks keep running after `shutdown`.
    #[must_use]
    pub fn continue_existing_periodic_tasks_after_shutdown(&self) -> bool {
        self.shared.continue_periodic.load(Ordering::Acquire)
    }

    /// Set whether periodic tasks keep running after `shutdown`.
    pub fn set_continue_existing_periodic_tasks_after_shutdown(&self, value: bool) {
        self.shared.continue_periodic.store(value, Ordering::Release);
    }

    /// Whether queued one-shot tasks still run after `shutdown`.
    #[must_use]
    pub fn execute_existing_delayed_tasks_after_shutdown(&self) -> bool {
        self.shared.execute_delayed.load(Ordering::Acquire)
    }

    /// Set whether queued one-shot tasks still run after `shutdown`.
    pub fn set_execute_existing_delayed_tasks_after_shutdown(&self, value: bool) {
        self.shared.execute_delayed.store(value, Ordering::Release);
    }

    /// Whether cancelling a task removes it from the queue immediately.
    #[must_use]
    pub fn remove_on_cancel(&self) -> bool {
        self.shared.remove_on_cancel()
    }

    /// Set whether cancelling a task removes it from the queue immediately.
    pub fn set_remove_on_cancel(&self, value: bool) {
        self.shared.remove_on_cancel.store(value, Ordering::Release);
    }

    fn join_dispatcher(&self) {
        let Some(handle) = self.dispatcher.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            warn!("Dispatcher thread panicked");
        }
    }
}

impl Drop for ScheduledThreadPool {
    fn drop(&mut self) {
        match self.state() {
            PoolState::Running => drop(self.shutdown_now()),
            // Periodic tasks kept past `shutdown` would never stop otherwise.
            PoolState::ShuttingDown if self.continue_existing_periodic_tasks_after_shutdown() => {
                debug!("Scheduled pool dropped with periodic tasks still running");
                drop(self.shutdown_now());
            }
            // Graceful drain in progress: the dispatcher owns what it needs.
            PoolState::ShuttingDown => debug!("Scheduled pool dropped while draining"),
            PoolState::Stopped => self.join_dispatcher(),
        }
    }
}

impl fmt::Debug for ScheduledThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledThreadPool")
            .field("state", &self.state())
            .field("queue_len", &self.queue_len())
            .field("policy", &self.policy())
            .finish_non_exhaustive()
    }
}

//! Worker pool with dedicated OS threads.
//!
//! Jobs travel to the workers through a bounded `crossbeam_channel`. Workers
//! block on `recv` (no polling) and exit when the channel is closed, which is
//! how both shutdown flavours reach idle workers.
//!
//! # Example
//!
//! ```
//! use prometheus_scheduled_pool::config::WorkerPoolConfig;
//! use prometheus_scheduled_pool::core::WorkerPool;
//! use std::time::Duration;
//!
//! let pool = WorkerPool::new(WorkerPoolConfig::new().with_worker_count(2)).unwrap();
//! let handle = pool.submit(|| 2 + 2).unwrap();
//! assert_eq!(handle.get(Duration::from_secs(5)).unwrap(), 4);
//! pool.shutdown();
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Select, Sender, TrySendError};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::WorkerPoolConfig;
use crate::core::future_task::{panic_message, FutureTask, Job, TaskHandle};
use crate::core::SchedulerError;
use crate::monitor::Monitor;
use crate::util::clock;

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Jobs currently executing.
    pub active_tasks: u64,
    /// Jobs waiting in the queue.
    pub queued_tasks: u64,
    /// Jobs that returned normally.
    pub completed_tasks: u64,
    /// Jobs that panicked.
    pub failed_tasks: u64,
    /// Jobs accepted into the queue.
    pub submitted_tasks: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub active_tasks: AtomicU64,
    pub queued_tasks: AtomicU64,
    pub completed_tasks: AtomicU64,
    pub failed_tasks: AtomicU64,
    pub submitted_tasks: AtomicU64,
}

impl PoolCounters {
    /// Get a snapshot of current statistics.
    pub fn snapshot(&self, worker_count: usize) -> PoolStats {
        PoolStats {
            worker_count,
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            queued_tasks: self.queued_tasks.load(Ordering::Relaxed),
            completed_tasks: self.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
            submitted_tasks: self.submitted_tasks.load(Ordering::Relaxed),
        }
    }
}

/// Fixed-size pool of worker threads executing [`Job`]s.
///
/// # Design
///
/// - **No polling**: workers block on channel recv, termination waits on a monitor
/// - **Two shutdowns**: `shutdown` drains the queue, `shutdown_now` abandons it
/// - **Panic isolation**: a panicking job is counted and logged; the worker lives on
pub struct WorkerPool {
    config: WorkerPoolConfig,
    /// Job sender. `None` once the pool stops accepting work.
    task_tx: Mutex<Option<Sender<Job>>>,
    /// Kept so `shutdown_now` can drain jobs nobody started.
    task_rx: Receiver<Job>,
    counters: Arc<PoolCounters>,
    /// Set when the pool stops accepting work.
    shutdown: AtomicBool,
    /// Set by `shutdown_now`; workers stop without draining.
    abort: Arc<AtomicBool>,
    /// Never carries a message; dropping the sender wakes blocked `execute` calls.
    abort_tx: Mutex<Option<Sender<()>>>,
    abort_rx: Receiver<()>,
    /// Number of worker threads still running.
    live: Arc<Monitor<usize>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Create a pool and start `config.worker_count` worker threads.
    ///
    /// # Errors
    ///
    /// - `InvalidConfig` if the configuration is invalid
    /// - `Internal` if a worker thread cannot be spawned
    pub fn new(config: WorkerPoolConfig) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;

        let (task_tx, task_rx) = bounded::<Job>(config.max_queue_depth);
        let counters = Arc::new(PoolCounters::default());
        let abort = Arc::new(AtomicBool::new(false));
        let live = Arc::new(Monitor::new(0_usize));
        let (abort_tx, abort_rx) = bounded::<()>(1);

        let pool = Self {
            task_tx: Mutex::new(Some(task_tx)),
            task_rx,
            counters,
            shutdown: AtomicBool::new(false),
            abort,
            abort_tx: Mutex::new(Some(abort_tx)),
            abort_rx,
            live,
            workers: Mutex::new(Vec::with_capacity(config.worker_count)),
            config,
        };

        for worker_id in 0..pool.config.worker_count {
            match pool.spawn_worker(worker_id) {
                Ok(handle) => pool.workers.lock().push(handle),
                Err(e) => {
                    pool.shutdown_now();
                    return Err(SchedulerError::Internal(format!(
                        "failed to spawn worker {worker_id}: {e}"
                    )));
                }
            }
        }

        info!(
            worker_count = pool.config.worker_count,
            max_queue_depth = pool.config.max_queue_depth,
            "WorkerPool initialized with dedicated OS threads"
        );

        Ok(pool)
    }

    /// Enqueue a job, waiting for queue space if the queue is full.
    ///
    /// # Errors
    ///
    /// `PoolShutdown` if the pool no longer accepts work, including when
    /// [`shutdown_now`](Self::shutdown_now) runs while this call waits for
    /// space. The job is dropped.
    pub fn execute(&self, mut job: Job) -> Result<(), SchedulerError> {
        let task_tx = self.sender()?;
        self.counters.queued_tasks.fetch_add(1, Ordering::Relaxed);

        let mut sel = Select::new();
        sel.send(&task_tx);
        sel.recv(&self.abort_rx);

        let sent = loop {
            // Abort wins over a slot freed by the shutdown drain.
            if self.abort.load(Ordering::Acquire) {
                break false;
            }
            match task_tx.try_send(job) {
                Ok(()) => break true,
                Err(TrySendError::Disconnected(_)) => break false,
                Err(TrySendError::Full(returned)) => {
                    job = returned;
                    sel.ready();
                }
            }
        };

        if !sent {
            self.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
            return Err(SchedulerError::PoolShutdown);
        }
        self.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Enqueue a job without waiting.
    ///
    /// # Errors
    ///
    /// - `QueueFull` if the queue is at `max_queue_depth`
    /// - `PoolShutdown` if the pool no longer accepts work
    pub fn try_execute(&self, job: Job) -> Result<(), SchedulerError> {
        let task_tx = self.sender()?;
        self.counters.queued_tasks.fetch_add(1, Ordering::Relaxed);
        match task_tx.try_send(job) {
            Ok(()) => {
                self.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                self.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
                warn!("Worker pool queue is full");
                Err(SchedulerError::QueueFull(format!(
                    "worker queue at capacity {}",
                    self.config.max_queue_depth
                )))
            }
            Err(TrySendError::Disconnected(_)) => {
                self.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
                Err(SchedulerError::PoolShutdown)
            }
        }
    }

    /// Wrap `f` in a [`FutureTask`] and enqueue it, waiting for space if needed.
    ///
    /// # Errors
    ///
    /// `PoolShutdown` if the pool no longer accepts work.
    pub fn submit<F, R>(&self, f: F) -> Result<TaskHandle<R>, SchedulerError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (task, handle) = FutureTask::new(f);
        self.execute(task.into_job())?;
        Ok(handle)
    }

    /// Fail-fast variant of [`submit`](Self::submit).
    ///
    /// # Errors
    ///
    /// - `QueueFull` if the queue is at `max_queue_depth`
    /// - `PoolShutdown` if the pool no longer accepts work
    pub fn try_submit<F, R>(&self, f: F) -> Result<TaskHandle<R>, SchedulerError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (task, handle) = FutureTask::new(f);
        self.try_execute(task.into_job())?;
        Ok(handle)
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot(self.config.worker_count)
    }

    /// Pool configuration.
    #[must_use]
    pub const fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    /// Whether the pool stopped accepting work.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Whether the pool is shut down and every worker thread has exited.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.is_shutdown() && *self.live.lock() == 0
    }

    /// Stop accepting work, let workers finish everything already queued, and
    /// join them.
    pub fn shutdown(&self) {
        self.close();
        self.join_workers();

        info!(worker_count = self.config.worker_count, "Worker pool shut down complete");
    }

    /// Stop accepting work without waiting for the workers.
    ///
    /// Queued jobs still run; workers exit once the queue is empty. Safe to
    /// call from a job, since nothing is joined. Returns `false` if the pool
    /// had already stopped accepting work.
    pub fn close(&self) -> bool {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return false;
        }
        info!("Shutting down worker pool");

        // Dropping the sender lets workers drain the queue and then see the
        // channel disconnect.
        self.task_tx.lock().take();
        true
    }

    /// Stop accepting work and abandon everything still queued.
    ///
    /// Returns the jobs that never started, in queue order. Jobs already
    /// running are left to finish; idle workers are woken and exit. Does not
    /// wait for the workers; see [`await_termination`](Self::await_termination).
    pub fn shutdown_now(&self) -> Vec<Job> {
        self.shutdown.store(true, Ordering::Release);
        self.abort.store(true, Ordering::Release);
        self.task_tx.lock().take();
        self.abort_tx.lock().take();

        let abandoned: Vec<Job> = self.task_rx.try_iter().collect();
        self.counters
            .queued_tasks
            .fetch_sub(abandoned.len() as u64, Ordering::Relaxed);

        info!(abandoned = abandoned.len(), "Worker pool shut down immediately");
        abandoned
    }

    /// Wait up to `timeout` for every worker thread to exit.
    ///
    /// Returns `true` if all workers have exited.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = clock::deadline_after(timeout);
        let mut live = self.live.lock();
        while *live > 0 {
            if self.live.wait_until(&mut live, deadline) && *live > 0 {
                return false;
            }
        }
        drop(live);
        self.join_workers();
        true
    }

    fn sender(&self) -> Result<Sender<Job>, SchedulerError> {
        if self.is_shutdown() {
            return Err(SchedulerError::PoolShutdown);
        }
        self.task_tx
            .lock()
            .as_ref()
            .cloned()
            .ok_or(SchedulerError::PoolShutdown)
    }

    /// Join finished (or finishing) workers, skipping the calling thread.
    fn join_workers(&self) {
        let current = thread::current().id();
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for (idx, worker) in workers.into_iter().enumerate() {
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                warn!(worker_id = idx, "Worker thread panicked");
            } else {
                debug!(worker_id = idx, "Worker joined successfully");
            }
        }
    }

    fn spawn_worker(&self, worker_id: usize) -> std::io::Result<JoinHandle<()>> {
        let task_rx = self.task_rx.clone();
        let counters = Arc::clone(&self.counters);
        let abort = Arc::clone(&self.abort);
        let live = Arc::clone(&self.live);

        *live.lock() += 1;
        let spawned = thread::Builder::new()
            .name(format!("{}-{worker_id}", self.config.thread_name_prefix))
            .stack_size(self.config.thread_stack_size)
            .spawn({
                let live = Arc::clone(&live);
                move || {
                    worker_loop(worker_id, &task_rx, &counters, &abort);
                    *live.lock() -= 1;
                    live.notify_all();
                }
            });
        if spawned.is_err() {
            *live.lock() -= 1;
        }
        spawned
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Signal shutdown but don't join; explicit shutdown() is required for
        // graceful cleanup.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            self.task_tx.lock().take();
            debug!("WorkerPool dropped without explicit shutdown - workers will be detached");
        }
    }
}

/// Worker loop - blocking recv until the channel closes.
fn worker_loop(
    worker_id: usize,
    task_rx: &Receiver<Job>,
    counters: &PoolCounters,
    abort: &AtomicBool,
) {
    debug!(worker_id = worker_id, "Worker thread started");

    while let Ok(job) = task_rx.recv() {
        counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);

        if abort.load(Ordering::Acquire) {
            // Keep receiving until disconnect: a racing `execute` may still
            // land a job after the abort drain.
            debug!(worker_id = worker_id, "Worker aborted, abandoning job");
            drop(job);
            continue;
        }

        counters.active_tasks.fetch_add(1, Ordering::Relaxed);
        match panic::catch_unwind(AssertUnwindSafe(job)) {
            Ok(()) => {
                counters.completed_tasks.fetch_add(1, Ordering::Relaxed);
            }
            Err(payload) => {
                counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
                warn!(
                    worker_id = worker_id,
                    panic = %panic_message(payload.as_ref()),
                    "Job panicked"
                );
            }
        }
        counters.active_tasks.fetch_sub(1, Ordering::Relaxed);
    }

    debug!(worker_id = worker_id, "Worker thread exiting");
}

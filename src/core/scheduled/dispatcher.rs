//! The dispatcher thread: moves due tasks from the work queue to the workers.
//!
//! It sleeps on the work-queue monitor, either until the earliest deadline or,
//! with an empty queue, until notified. Every `schedule`, cancel-removal,
//! periodic reschedule and shutdown notifies that monitor, so a sooner
//! insertion or a stop request is seen without waiting out the old deadline.

use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::MutexGuard;
use tracing::{debug, info, trace};

use super::{PoolState, Shared};
use crate::util::clock;

/// How the dispatch loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    /// `shutdown_now` raised the cancellation flag.
    Cancelled,
    /// Graceful shutdown and nothing left to dispatch.
    Drained,
}

/// Start the dispatcher thread for `shared`.
pub(super) fn spawn(shared: Arc<Shared>, name: &str) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || run(&shared))
}

fn run(shared: &Arc<Shared>) {
    debug!("Dispatcher thread started");

    if dispatch_loop(shared) == Exit::Drained {
        // Workers finish what is queued and exit on their own. Joining them here
        // would deadlock against a task that calls `shutdown_now`, which joins
        // this thread.
        shared.workers.close();
        shared.set_state(PoolState::Stopped);
        info!("Scheduled pool drained and stopped");
    }

    debug!("Dispatcher thread exiting");
}

fn dispatch_loop(shared: &Arc<Shared>) -> Exit {
    let monitor = shared.queue.monitor();
    let mut queue = monitor.lock();

    loop {
        if shared.cancelled.load(Ordering::Acquire) {
            return Exit::Cancelled;
        }

        let Some(head) = queue.peek_key() else {
            if shared.shutting_down.load(Ordering::Acquire) && queue.periodic_in_flight == 0 {
                return Exit::Drained;
            }
            monitor.wait(&mut queue);
            continue;
        };

        if clock::nanos_until(head.deadline, clock::now()) > 0 {
            monitor.wait_until(&mut queue, head.deadline);
            continue;
        }

        let Some(task) = queue.entries.remove(&head) else {
            continue;
        };
        if task.is_cancelled() {
            trace!(task_id = task.id(), "Skipping cancelled task");
            continue;
        }

        let task_id = task.id();
        let periodic = task.is_periodic();
        if periodic {
            queue.periodic_in_flight += 1;
        }

        let job = task.into_job(Arc::downgrade(shared));
        let handed = MutexGuard::unlocked(&mut queue, || shared.workers.execute(job));
        if let Err(e) = handed {
            debug!(task_id = task_id, error = %e, "Worker pool rejected due task");
            if periodic {
                queue.periodic_in_flight = queue.periodic_in_flight.saturating_sub(1);
            }
        } else {
            trace!(task_id = task_id, periodic = periodic, "Task dispatched");
        }

        // Re-evaluate: someone may have inserted while the lock was released.
        monitor.notify_all();
    }
}

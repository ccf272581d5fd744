//! Deadline-ordered work queue guarded by a single monitor.

use std::collections::BTreeMap;
use std::time::Instant;

use parking_lot::MutexGuard;

use super::task::ScheduledTask;
use crate::monitor::Monitor;

/// Position of a task in the queue: earliest deadline first, then submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct QueueKey {
    pub deadline: Instant,
    pub seq: u64,
}

/// Everything the dispatcher waits on.
pub(crate) struct QueueState {
    pub entries: BTreeMap<QueueKey, ScheduledTask>,
    /// Periodic tasks handed to workers whose next run is not decided yet.
    pub periodic_in_flight: usize,
    next_seq: u64,
}

impl QueueState {
    /// Insert `task` behind every entry with the same deadline.
    pub fn push(&mut self, task: ScheduledTask) -> QueueKey {
        let key = QueueKey {
            deadline: task.deadline(),
            seq: self.next_seq,
        };
        self.next_seq += 1;
        task.set_key(key);
        self.entries.insert(key, task);
        key
    }

    /// Earliest entry, if any.
    pub fn peek_key(&self) -> Option<QueueKey> {
        self.entries.first_key_value().map(|(key, _)| *key)
    }
}

/// Pending scheduled tasks ordered by ascending deadline.
pub(crate) struct WorkQueue {
    state: Monitor<QueueState>,
}

impl WorkQueue {
    pub const fn new() -> Self {
        Self {
            state: Monitor::new(QueueState {
                entries: BTreeMap::new(),
                periodic_in_flight: 0,
                next_seq: 0,
            }),
        }
    }

    pub fn monitor(&self) -> &Monitor<QueueState> {
        &self.state
    }

    pub fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock()
    }

    /// Remove one entry; the dispatcher is woken so it re-reads the head.
    pub fn remove(&self, key: QueueKey) -> Option<ScheduledTask> {
        let removed = self.state.lock().entries.remove(&key);
        if removed.is_some() {
            self.state.notify_all();
        }
        removed
    }

    /// Take every queued task in dispatch order.
    pub fn drain(&self) -> Vec<ScheduledTask> {
        let entries = std::mem::take(&mut self.state.lock().entries);
        self.state.notify_all();
        entries.into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn wake_all(&self) {
        self.state.notify_all();
    }
}

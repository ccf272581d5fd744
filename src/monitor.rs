//! Monitor implementation
//!
//! A monitor pairs a mutual-exclusion lock with a condition variable, so that the
//! state a thread waits on and the signal that announces a change to it always
//! travel together. Both halves come from the `parking_lot` crate.
//!
//! # Features
//!
//! - Unbounded and bounded (timed) waits
//! - `notify_one` / `notify_all`
//! - No poisoning on panic
//!
//! # Examples
//!
//! ```
//! use prometheus_scheduled_pool::Monitor;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let monitor = Arc::new(Monitor::new(false));
//! let monitor2 = Arc::clone(&monitor);
//!
//! thread::spawn(move || {
//!     *monitor2.lock() = true;
//!     monitor2.notify_one();
//! });
//!
//! let mut ready = monitor.lock();
//! while !*ready {
//!     monitor.wait(&mut ready);
//! }
//! ```

use std::time::{Duration, Instant};

pub use parking_lot::{Condvar, Mutex, MutexGuard};

/// A mutex and a condition variable guarding the same value.
///
/// Every wait releases the lock while parked and re-acquires it before
/// returning, exactly like [`Condvar`]. Waits may wake spuriously; callers
/// re-check their condition in a loop or use [`Monitor::wait_while`].
#[derive(Debug, Default)]
pub struct Monitor<T> {
    lock: Mutex<T>,
    signal: Condvar,
}

impl<T> Monitor<T> {
    /// Creates a new monitor guarding `value`.
    #[inline]
    pub const fn new(value: T) -> Self {
        Self {
            lock: Mutex::new(value),
            signal: Condvar::new(),
        }
    }

    /// Acquires the monitor's lock.
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.lock.lock()
    }

    /// Attempts to acquire the monitor's lock without blocking.
    #[inline]
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.lock.try_lock()
    }

    /// Blocks until notified.
    ///
    /// `guard` must come from this monitor's [`lock`](Self::lock).
    #[inline]
    pub fn wait(&self, guard: &mut MutexGuard<'_, T>) {
        self.signal.wait(guard);
    }

    /// Blocks until notified or until `timeout` elapses.
    ///
    /// Returns `true` if the wait timed out.
    ///
    /// # Examples
    ///
    /// ```
    /// use prometheus_scheduled_pool::Monitor;
    /// use std::time::Duration;
    ///
    /// let monitor = Monitor::new(0);
    /// let mut guard = monitor.lock();
    /// assert!(monitor.wait_for(&mut guard, Duration::from_millis(5)));
    /// ```
    #[inline]
    pub fn wait_for(&self, guard: &mut MutexGuard<'_, T>, timeout: Duration) -> bool {
        self.signal.wait_for(guard, timeout).timed_out()
    }

    /// Blocks until notified or until `deadline` is reached.
    ///
    /// Returns `true` if the wait timed out.
    #[inline]
    pub fn wait_until(&self, guard: &mut MutexGuard<'_, T>, deadline: Instant) -> bool {
        self.signal.wait_until(guard, deadline).timed_out()
    }

    /// Blocks for as long as `condition` returns `true`.
    #[inline]
    pub fn wait_while<F>(&self, guard: &mut MutexGuard<'_, T>, condition: F)
    where
        F: FnMut(&mut T) -> bool,
    {
        self.signal.wait_while(guard, condition);
    }

    /// Wakes one thread blocked on this monitor.
    ///
    /// Returns whether a thread was woken. Notifications are not buffered.
    #[inline]
    pub fn notify_one(&self) -> bool {
        self.signal.notify_one()
    }

    /// Wakes every thread blocked on this monitor and returns how many were woken.
    #[inline]
    pub fn notify_all(&self) -> usize {
        self.signal.notify_all()
    }

    /// Consumes the monitor and returns the guarded value.
    #[inline]
    pub fn into_inner(self) -> T {
        self.lock.into_inner()
    }
}

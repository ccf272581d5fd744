//! Multi-producer multi-consumer bounded ring buffer.
//!
//! Same contract as [`spsc`](super::spsc) but any number of handles may put and
//! get. Producers take turns on a writer lock and consumers on a reader lock;
//! between those two groups the lock-free single-writer/single-reader rules of
//! the shared core still apply, so a producer and a consumer never wait on
//! each other. `put` and `get` still fail fast on a full or empty buffer.
//!
//! # Example
//!
//! ```
//! use prometheus_scheduled_pool::ring::RingBufferNxM;
//! use std::thread;
//!
//! let ring = RingBufferNxM::new(16);
//! let handles: Vec<_> = (0..3)
//!     .map(|i| {
//!         let ring = ring.clone();
//!         thread::spawn(move || ring.put(i).is_ok())
//!     })
//!     .collect();
//! for handle in handles {
//!     assert!(handle.join().unwrap());
//! }
//! assert_eq!(ring.len(), 3);
//! ```

#![allow(unsafe_code)]

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::raw::{Destroyer, RingCore};
use crate::core::RingFull;

struct Shared<T> {
    core: RingCore<T>,
    writer: Mutex<()>,
    reader: Mutex<()>,
}

/// A bounded ring buffer shared by any number of producers and consumers.
///
/// Cloning a handle acquires another reference; dropping one releases it. The
/// last release hands resident items to the destroyer, if any.
pub struct RingBufferNxM<T> {
    shared: Arc<Shared<T>>,
}

impl<T> RingBufferNxM<T> {
    /// Creates a buffer with `capacity` slots, `capacity - 1` of them usable.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is not a power of two.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::from_core(RingCore::new(capacity, None))
    }

    /// Creates a buffer whose leftover items are passed to `destroyer` on teardown.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is not a power of two.
    #[must_use]
    pub fn with_destroyer<F>(capacity: usize, destroyer: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let destroyer: Destroyer<T> = Box::new(destroyer);
        Self::from_core(RingCore::new(capacity, Some(destroyer)))
    }

    fn from_core(core: RingCore<T>) -> Self {
        Self {
            shared: Arc::new(Shared {
                core,
                writer: Mutex::new(()),
                reader: Mutex::new(()),
            }),
        }
    }

    /// Appends `item` unless the buffer is full.
    ///
    /// # Errors
    ///
    /// Returns [`RingFull`] carrying `item` back when no slot is free.
    pub fn put(&self, item: T) -> Result<(), RingFull<T>> {
        let _writer = self.shared.writer.lock();
        // SAFETY: the writer lock makes this the only producer.
        unsafe { self.shared.core.put(item) }
    }

    /// Removes the oldest item, or returns `None` if the buffer is empty.
    pub fn get(&self) -> Option<T> {
        let _reader = self.shared.reader.lock();
        // SAFETY: the reader lock makes this the only consumer.
        unsafe { self.shared.core.get() }
    }

    /// Free slots; advisory under concurrent use.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.shared.core.remaining()
    }

    /// Items currently resident; advisory under concurrent use.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.core.len()
    }

    /// Whether no item is resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total slot count, including the one that is never filled.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.core.capacity()
    }

    /// Number of handles currently holding the buffer.
    #[must_use]
    pub fn owners(&self) -> usize {
        Arc::strong_count(&self.shared)
    }
}

impl<T> Clone for RingBufferNxM<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> fmt::Debug for RingBufferNxM<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBufferNxM")
            .field("core", &self.shared.core)
            .field("owners", &self.owners())
            .finish()
    }
}

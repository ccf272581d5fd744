//! Single-producer single-consumer bounded ring buffer.
//!
//! The buffer is created as a `(Producer, Consumer)` pair. These two halves are
//! the only owners the buffer ever has: neither is `Clone`, and each operation
//! takes `&mut self`, so the single-writer/single-reader discipline on
//! `head`/`tail` is enforced by the type system rather than by convention.
//! Neither `put` nor `get` ever blocks.
//!
//! # Example
//!
//! ```
//! use prometheus_scheduled_pool::ring::spsc;
//!
//! let (mut producer, mut consumer) = spsc::ring_buffer::<u32>(4);
//!
//! assert!(producer.put(1).is_ok());
//! assert!(producer.put(2).is_ok());
//! assert!(producer.put(3).is_ok());
//! // One slot is always kept free.
//! assert!(producer.put(4).is_err());
//!
//! assert_eq!(consumer.get(), Some(1));
//! assert_eq!(producer.remaining(), 1);
//! ```

#![allow(unsafe_code)]

use std::sync::Arc;

use super::raw::{Destroyer, RingCore};
use crate::core::RingFull;

/// Creates a ring buffer with `capacity` slots, `capacity - 1` of them usable.
///
/// Items still resident when both halves are dropped are simply dropped.
///
/// # Panics
///
/// Panics if `capacity` is not a power of two.
#[must_use]
pub fn ring_buffer<T>(capacity: usize) -> (Producer<T>, Consumer<T>) {
    split(RingCore::new(capacity, None))
}

/// Creates a ring buffer whose leftover items are handed to `destroyer`, oldest
/// first, when the last half is dropped.
///
/// # Panics
///
/// Panics if `capacity` is not a power of two.
#[must_use]
pub fn ring_buffer_with_destroyer<T, F>(capacity: usize, destroyer: F) -> (Producer<T>, Consumer<T>)
where
    F: Fn(T) + Send + Sync + 'static,
{
    let destroyer: Destroyer<T> = Box::new(destroyer);
    split(RingCore::new(capacity, Some(destroyer)))
}

fn split<T>(core: RingCore<T>) -> (Producer<T>, Consumer<T>) {
    let core = Arc::new(core);
    (
        Producer {
            core: Arc::clone(&core),
        },
        Consumer { core },
    )
}

/// The writing half of a single-producer single-consumer ring buffer.
#[derive(Debug)]
pub struct Producer<T> {
    core: Arc<RingCore<T>>,
}

impl<T> Producer<T> {
    /// Appends `item` unless the buffer is full.
    ///
    /// # Errors
    ///
    /// Returns [`RingFull`] carrying `item` back when no slot is free. The
    /// buffer is left untouched.
    #[inline]
    pub fn put(&mut self, item: T) -> Result<(), RingFull<T>> {
        // SAFETY: `Producer` is not `Clone` and `put` takes `&mut self`, so
        // this is the only writer.
        unsafe { self.core.put(item) }
    }

    /// Free slots; advisory, since the consumer may free more at any time.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.core.remaining()
    }

    /// Items currently resident.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.core.len()
    }

    /// Whether no item is resident.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.core.len() == 0
    }

    /// Total slot count, including the one that is never filled.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.core.capacity()
    }

    /// Number of halves still holding the buffer (1 or 2).
    #[must_use]
    pub fn owners(&self) -> usize {
        Arc::strong_count(&self.core)
    }
}

/// The reading half of a single-producer single-consumer ring buffer.
#[derive(Debug)]
pub struct Consumer<T> {
    core: Arc<RingCore<T>>,
}

impl<T> Consumer<T> {
    /// Removes the oldest item, or returns `None` if the buffer is empty.
    #[inline]
    pub fn get(&mut self) -> Option<T> {
        // SAFETY: `Consumer` is not `Clone` and `get` takes `&mut self`, so
        // this is the only reader.
        unsafe { self.core.get() }
    }

    /// Free slots; advisory, since the producer may fill them at any time.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.core.remaining()
    }

    /// Items currently resident.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.core.len()
    }

    /// Whether no item is resident.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.core.len() == 0
    }

    /// Total slot count, including the one that is never filled.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.core.capacity()
    }

    /// Number of halves still holding the buffer (1 or 2).
    #[must_use]
    pub fn owners(&self) -> usize {
        Arc::strong_count(&self.core)
    }
}

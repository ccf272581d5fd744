//! Slot storage and index arithmetic shared by both ring buffer flavours.
//!
//! The core never locks. Its correctness rests on two rules that the
//! wrappers enforce: at most one thread calls [`RingCore::put`] at a time, and
//! at most one thread calls [`RingCore::get`] at a time. The producer owns
//! `head`, the consumer owns `tail`, and each publishes its index with a
//! `Release` store only after it is done with the slot the index exposes.

#![allow(unsafe_code)]

use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

use crate::core::RingFull;

/// Callback receiving items still resident when a ring buffer is torn down.
pub type Destroyer<T> = Box<dyn Fn(T) + Send + Sync>;

pub(crate) struct RingCore<T> {
    /// Next slot the producer writes.
    head: CachePadded<AtomicUsize>,
    /// Next slot the consumer reads.
    tail: CachePadded<AtomicUsize>,
    /// `capacity - 1`; wraparound is `index & mask`.
    mask: usize,
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    destroyer: Option<Destroyer<T>>,
}

// SAFETY: slots are only touched by the single producer (between `tail` and
// `head` exclusive of the occupied range) or the single consumer (inside the
// occupied range); the acquire/release pairs on `head`/`tail` order the
// accesses. Items move between threads, hence `T: Send`.
unsafe impl<T: Send> Send for RingCore<T> {}
unsafe impl<T: Send> Sync for RingCore<T> {}

impl<T> RingCore<T> {
    /// # Panics
    ///
    /// Panics if `capacity` is not a power of two.
    pub(crate) fn new(capacity: usize, destroyer: Option<Destroyer<T>>) -> Self {
        assert!(
            capacity.is_power_of_two(),
            "ring buffer capacity must be a power of two, got {capacity}"
        );
        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();
        Self {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            mask: capacity - 1,
            slots,
            destroyer,
        }
    }

    pub(crate) const fn capacity(&self) -> usize {
        self.mask + 1
    }

    pub(crate) fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        head.wrapping_sub(tail) & self.mask
    }

    /// One slot is always sacrificed so that full and empty differ.
    pub(crate) fn remaining(&self) -> usize {
        self.mask - self.len()
    }

    /// Writes `item` at `head`, then publishes the advanced `head`.
    ///
    /// # Safety
    ///
    /// No other thread may call `put` on this core concurrently.
    pub(crate) unsafe fn put(&self, item: T) -> Result<(), RingFull<T>> {
        let head = self.head.load(Ordering::Relaxed);
        let next = (head + 1) & self.mask;
        if next == self.tail.load(Ordering::Acquire) {
            return Err(RingFull(item));
        }
        // SAFETY: `head` is outside the occupied range, so the consumer is not
        // reading it, and the caller guarantees no other producer writes it.
        unsafe { (*self.slots[head].get()).write(item) };
        self.head.store(next, Ordering::Release);
        Ok(())
    }

    /// Reads the slot at `tail`, then publishes the advanced `tail`.
    ///
    /// # Safety
    ///
    /// No other thread may call `get` on this core concurrently.
    pub(crate) unsafe fn get(&self) -> Option<T> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: the acquire load of `head` observed the producer's write of
        // this slot, and the slot is initialized until we advance `tail`.
        let item = unsafe { (*self.slots[tail].get()).assume_init_read() };
        self.tail.store((tail + 1) & self.mask, Ordering::Release);
        Some(item)
    }
}

impl<T> Drop for RingCore<T> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` means no producer or consumer is left.
        while let Some(item) = unsafe { self.get() } {
            if let Some(destroyer) = &self.destroyer {
                destroyer(item);
            }
        }
    }
}

impl<T> fmt::Debug for RingCore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingCore")
            .field("capacity", &self.capacity())
            .field("head", &self.head.load(Ordering::Relaxed))
            .field("tail", &self.tail.load(Ordering::Relaxed))
            .field("has_destroyer", &self.destroyer.is_some())
            .finish()
    }
}

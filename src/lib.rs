//! # Prometheus Scheduled Pool
//!
//! Bounded ring buffers and a deadline-ordered scheduled thread pool.
//!
//! The crate provides the hand-off and timing primitives underneath a task
//! scheduler: where work sits while it waits, who wakes up when it is due, and
//! how it reaches a worker thread.
//!
//! ## Key Features
//!
//! - **SPSC ring buffer**: lock-free single-producer/single-consumer queue with
//!   acquire/release index publication and a type-enforced ownership split
//! - **NxM ring buffer**: the same storage shared by any number of producers and
//!   consumers, serialized per side
//! - **Worker pool**: dedicated OS threads fed through a bounded channel
//! - **Scheduled thread pool**: one dispatcher thread that sleeps until the
//!   earliest deadline and hands due tasks to the workers; delayed, immediate,
//!   fixed-rate and fixed-delay tasks; graceful and immediate shutdown
//! - **Monitor**: mutex plus condition variable with bounded and unbounded waits
//!
//! ## Ring buffers
//!
//! ```rust
//! use prometheus_scheduled_pool::ring::ring_buffer;
//!
//! let (mut tx, mut rx) = ring_buffer::<u32>(4);
//! assert!(tx.put(1).is_ok());
//! assert_eq!(tx.remaining(), 2);
//! assert_eq!(rx.get(), Some(1));
//! ```
//!
//! ## Scheduled thread pool
//!
//! ```rust
//! use prometheus_scheduled_pool::core::ScheduledThreadPool;
//! use std::time::Duration;
//!
//! let pool = ScheduledThreadPool::with_workers(2).unwrap();
//! let soon = pool.submit(|| 1).unwrap();
//! let later = pool.schedule(|| 2, Duration::from_millis(20)).unwrap();
//! assert_eq!(soon.get(Duration::from_secs(5)).unwrap(), 1);
//! assert_eq!(later.get(Duration::from_secs(5)).unwrap(), 2);
//! pool.shutdown();
//! assert!(pool.await_termination(Duration::from_secs(5)));
//! ```
//!
//! For complete examples, see:
//! - `tests/scheduled_pool_test.rs` - dispatcher ordering, timeliness and shutdown
//! - `tests/ring_buffer_test.rs` - ring buffer contracts under concurrency

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Worker pool, one-shot tasks and the scheduled thread pool.
pub mod core;
/// Configuration models for worker pools, scheduled pools and shutdown policy.
pub mod config;
/// Builders to construct scheduled pools from configuration.
pub mod builders;
/// Mutex plus condition variable.
pub mod monitor;
/// Bounded ring buffers.
pub mod ring;
/// Shared utilities.
pub mod util;

pub use monitor::{Condvar, Monitor, Mutex, MutexGuard};

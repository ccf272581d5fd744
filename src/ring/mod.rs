//! Bounded ring buffers for producer/consumer hand-off.
//!
//! - [`spsc`]: exactly one producer and one consumer, lock-free.
//! - [`RingBufferNxM`]: any number of producers and consumers, serialized per side.
//!
//! Capacities must be powers of two; one slot is always left empty.

mod raw;

pub mod mpmc;
pub mod spsc;

pub use mpmc::RingBufferNxM;
pub use raw::Destroyer;
pub use spsc::{ring_buffer, ring_buffer_with_destroyer, Consumer, Producer};

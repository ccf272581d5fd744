//! Builders to construct scheduled pools from configuration.

pub mod pool_builder;

pub use pool_builder::{build_scheduled_pools, PoolBuilder};

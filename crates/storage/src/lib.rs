//! Storage layer for geostats
//!
//! This crate implements the statistics store backend:
//! - ShardedStatisticsStore: DashMap + FxHashMap, sharded by record type
//! - Versioned put with expected version (optimistic concurrency)
//! - Store-wide version allocation with AtomicU64
//! - FaultInjectingStore for outage and contention testing
//!
//! # Performance
//!
//! - Lock-free reads via DashMap
//! - Per record type sharding (no cross-type contention)
//! - FxHashMap for O(1) lookups

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod sharded;
pub mod testing;

pub use sharded::{Shard, ShardedStatisticsStore};

//! Testing utilities for statistics stores
//!
//! - **Fault injection**: backend outages and lost version races on demand
//!
//! # Example
//!
//! ```ignore
//! use geostats_storage::testing::FaultInjectingStore;
//!
//! let store = FaultInjectingStore::new(ShardedStatisticsStore::new());
//! store.fail_next_scans(1);
//! ```

mod faults;

pub use faults::{FaultInjectingStore, FaultPoint};

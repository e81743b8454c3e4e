//! Statistics maintenance engine for geostats
//!
//! This crate keeps stored statistics consistent with the record set:
//! - StatisticsEngine: embedding surface (register, ingest, delete, read)
//! - TypeCatalog: which statistics each record type maintains
//! - StatisticsValue: one aggregate bound to its identity and algebra
//! - UpdateDispatcher: ingest/delete fan-out with optimistic retry
//! - ConsistencyCoordinator: dirty marking, recompute, recovery
//! - RecomputeScheduler: background worker pool for recompute tasks
//!
//! The engine is the only component that knows about:
//! - Which deletes can be retracted and which need a rescan
//! - The dirty marker protocol that makes recompute crash safe

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod engine;
pub mod partial;
pub mod retry;
pub mod scheduler;
pub mod testing;
pub mod value;

pub use catalog::{Binding, BindingSpec, TypeBindings, TypeCatalog};
pub use config::{EngineConfig, RecomputeConfig, RecomputeMode, CONFIG_FILE_NAME};
pub use coordinator::{
    CancellationToken, ConsistencyCoordinator, CoordinatorStats, RecomputeReport,
    RecoveryReport, Scheduled, TaskPhase,
};
pub use dispatcher::{DeleteOutcome, UpdateDispatcher};
pub use engine::{StatisticReport, StatisticSnapshot, StatisticsEngine};
pub use partial::PartialAggregator;
pub use retry::RetryConfig;
pub use scheduler::{BackpressureError, RecomputeScheduler, SchedulerStats, TaskPriority};
pub use value::{Statistics, StatisticsValue};

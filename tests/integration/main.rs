//! Integration Tests
//!
//! Cross-crate tests through the `geostats` facade:
//! - Scenarios: ingest, delete by id, delete by predicate, partition merge
//! - Custom algebras registered alongside the built-ins
//! - Model-based: any ingest/delete history matches a fresh fold
//! - Verification reports

#[path = "../common/mod.rs"]
mod common;

mod custom_algebra;
mod model;
mod reports;
mod scenarios;

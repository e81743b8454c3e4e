//! Error types for geostats
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! ## Retry policy
//!
//! - `VersionConflict` is expected under concurrent writers and retried
//!   internally up to a bound.
//! - `ContentionExceeded` and `BackendUnavailable` are transient: the
//!   operation was not applied and the caller may retry it.
//! - `PartiallyApplied` must not be replayed: the written statistics already
//!   hold the event and the rest are dirty until recomputed.
//! - Kind, type and identity errors indicate misuse and are never retried.

use crate::kind::StatisticKind;
use crate::types::StatisticId;
use crate::version::Version;
use std::io;
use thiserror::Error;

/// Result type alias for geostats operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the statistics engine
#[derive(Debug, Error)]
pub enum Error {
    /// Lookup of an unregistered statistic kind
    #[error("Unknown statistic kind: {0}")]
    UnknownKind(StatisticKind),

    /// Registration of a kind that is already registered
    #[error("Statistic kind already registered: {0}")]
    DuplicateKind(StatisticKind),

    /// Kind parameters rejected by its algebra
    #[error("Invalid statistic kind {kind}: {reason}")]
    InvalidKind {
        /// The rejected kind
        kind: StatisticKind,
        /// Why it was rejected
        reason: String,
    },

    /// Record applied to a statistic of another record type
    #[error("Type mismatch: statistic belongs to '{expected}', record is '{actual}'")]
    TypeMismatch {
        /// Record type of the statistic
        expected: String,
        /// Record type of the record
        actual: String,
    },

    /// Merge of two values with different identities or algebras
    #[error("Identity mismatch: cannot merge {left} with {right}")]
    IdentityMismatch {
        /// Identity of the receiving value
        left: StatisticId,
        /// Identity of the merged value
        right: StatisticId,
    },

    /// Retraction requested from a kind without `retract`
    #[error("Statistic kind {0} does not support retraction")]
    NotInvertible(StatisticKind),

    /// Optimistic write lost against a concurrent writer
    #[error("Version conflict on {id}: expected {expected}, found {actual}")]
    VersionConflict {
        /// Contended statistic
        id: StatisticId,
        /// Version the writer read
        expected: Version,
        /// Version currently stored
        actual: Version,
    },

    /// Retry bound exceeded on a contended key
    #[error("Contention exceeded on {id} after {attempts} attempts")]
    ContentionExceeded {
        /// Contended statistic
        id: StatisticId,
        /// Attempts made
        attempts: usize,
    },

    /// Store or record source I/O failure
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Record event written to some of its statistics before a failure
    ///
    /// The unwritten statistics were marked dirty, so replaying the event
    /// would count it twice in the written ones. Recompute finishes them.
    #[error("Partially applied to {applied} statistics, {dirty} marked dirty: {source}")]
    PartiallyApplied {
        /// Statistics the event was written to
        applied: usize,
        /// Statistics marked dirty instead
        dirty: usize,
        /// Failure that stopped the event
        #[source]
        source: Box<Error>,
    },

    /// Statistic not present in the store
    #[error("Statistic not found: {0}")]
    NotFound(StatisticId),

    /// Recompute cancelled between records
    #[error("Recompute cancelled for record type '{0}'")]
    Cancelled(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid operation or state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error (config files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Check if the error is retried internally by optimistic writers
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::VersionConflict { .. })
    }

    /// Check if the operation may succeed when the caller retries it
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::VersionConflict { .. }
                | Error::ContentionExceeded { .. }
                | Error::BackendUnavailable(_)
        )
    }

    /// Check if the error indicates caller misuse
    pub fn is_misuse(&self) -> bool {
        matches!(
            self,
            Error::UnknownKind(_)
                | Error::DuplicateKind(_)
                | Error::InvalidKind { .. }
                | Error::TypeMismatch { .. }
                | Error::IdentityMismatch { .. }
                | Error::NotInvertible(_)
        )
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

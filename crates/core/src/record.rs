//! Records and delete scopes handed in by collaborators
//!
//! The engine never interprets geometry or filters. The ingestion pipeline
//! hands over each record's field values with geometries already reduced to
//! envelopes; the query layer resolves delete requests to a `DeleteScope`.

use crate::types::{BoundingBox, TimeRange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of a record within its record type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    /// Create a record id
    pub fn new(id: impl Into<String>) -> Self {
        RecordId(id.into())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId(s.to_string())
    }
}

/// A single field value of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    /// 64-bit signed integer
    Int(i64),
    /// 64-bit float
    Float(f64),
    /// UTF-8 text
    Text(String),
    /// Envelope of a geometry
    Envelope(BoundingBox),
    /// Instant or interval in epoch milliseconds
    Time(TimeRange),
}

impl FieldValue {
    /// Numeric view of the value (integers widen to f64)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    /// Integer view of the value
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Envelope view of the value
    pub fn as_envelope(&self) -> Option<BoundingBox> {
        match self {
            FieldValue::Envelope(b) => Some(*b),
            _ => None,
        }
    }

    /// Temporal view of the value (integers are instants)
    pub fn as_time(&self) -> Option<TimeRange> {
        match self {
            FieldValue::Time(t) => Some(*t),
            FieldValue::Int(v) => Some(TimeRange::instant(*v)),
            _ => None,
        }
    }

    /// Stable byte encoding used for hashing
    ///
    /// Each variant is prefixed with its own tag byte so `Int(1)` and
    /// `Text("1")` never collide.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(17);
        match self {
            FieldValue::Int(v) => {
                out.push(0x01);
                out.extend_from_slice(&v.to_le_bytes());
            }
            FieldValue::Float(v) => {
                out.push(0x02);
                // -0.0 and 0.0 are the same value
                let v = if *v == 0.0 { 0.0f64 } else { *v };
                out.extend_from_slice(&v.to_bits().to_le_bytes());
            }
            FieldValue::Text(s) => {
                out.push(0x03);
                out.extend_from_slice(s.as_bytes());
            }
            FieldValue::Envelope(b) => {
                out.push(0x04);
                for c in [b.min_x, b.min_y, b.max_x, b.max_y] {
                    out.extend_from_slice(&c.to_bits().to_le_bytes());
                }
            }
            FieldValue::Time(t) => {
                out.push(0x05);
                out.extend_from_slice(&t.start.to_le_bytes());
                out.extend_from_slice(&t.end.to_le_bytes());
            }
        }
        out
    }
}

/// Unit of ingest and delete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identifier, unique within the record type
    pub id: RecordId,
    /// Owning record type
    pub record_type: String,
    /// Field values by field name
    pub fields: BTreeMap<String, FieldValue>,
}

impl Record {
    /// Create a record without fields
    pub fn new(id: impl Into<RecordId>, record_type: impl Into<String>) -> Self {
        Record {
            id: id.into(),
            record_type: record_type.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter
    pub fn with_field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Get a field value
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Check if a field is present
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId(s)
    }
}

/// Delete request as issued by a client
///
/// Kept on the scope for logging; the engine acts only on the resolved
/// `RemovedRecords`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeleteRequest {
    /// Explicit identifier set
    IdSet(Vec<RecordId>),
    /// Filter expression, opaque to the engine
    Predicate(String),
    /// Spatial-temporal constraint
    SpatialTemporal {
        /// Region envelope
        region: BoundingBox,
        /// Time window
        window: TimeRange,
    },
}

impl DeleteRequest {
    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            DeleteRequest::IdSet(_) => "id_set",
            DeleteRequest::Predicate(_) => "predicate",
            DeleteRequest::SpatialTemporal { .. } => "spatial_temporal",
        }
    }
}

/// What a resolved delete removed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RemovedRecords {
    /// The removed records are known (possibly none)
    Enumerated(Vec<Record>),
    /// Matches could not be enumerated without a full scan
    Unknown,
}

/// A delete request resolved to one record type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteScope {
    /// Affected record type
    pub record_type: String,
    /// The originating request
    pub request: DeleteRequest,
    /// Records removed within this scope
    pub removed: RemovedRecords,
}

impl DeleteScope {
    /// Scope for records removed by identifier
    pub fn by_ids(record_type: impl Into<String>, removed: Vec<Record>) -> Self {
        let ids = removed.iter().map(|r| r.id.clone()).collect();
        DeleteScope {
            record_type: record_type.into(),
            request: DeleteRequest::IdSet(ids),
            removed: RemovedRecords::Enumerated(removed),
        }
    }

    /// Scope for a request whose matches were enumerated by the collaborator
    pub fn resolved(
        record_type: impl Into<String>,
        request: DeleteRequest,
        removed: Vec<Record>,
    ) -> Self {
        DeleteScope {
            record_type: record_type.into(),
            request,
            removed: RemovedRecords::Enumerated(removed),
        }
    }

    /// Scope whose removed records are not known
    pub fn unresolved(record_type: impl Into<String>, request: DeleteRequest) -> Self {
        DeleteScope {
            record_type: record_type.into(),
            request,
            removed: RemovedRecords::Unknown,
        }
    }

    /// Check if the scope is known to have removed nothing
    pub fn is_noop(&self) -> bool {
        matches!(&self.removed, RemovedRecords::Enumerated(records) if records.is_empty())
    }

    /// The removed records, when known
    pub fn removed_records(&self) -> Option<&[Record]> {
        match &self.removed {
            RemovedRecords::Enumerated(records) => Some(records),
            RemovedRecords::Unknown => None,
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single primary-store document, reduced to what backup and restore need:
/// a stable identity, a modification timestamp for incremental selection, and
/// an opaque body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document identity within its collection
    pub id: String,

    /// Last modification timestamp
    pub modified_at: DateTime<Utc>,

    /// Opaque document payload
    pub body: serde_json::Value,
}

impl Document {
    pub fn new(id: impl Into<String>, modified_at: DateTime<Utc>, body: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            modified_at,
            body,
        }
    }
}

/// One record in a snapshot blob: a document tagged with its originating
/// collection so restore can route it without a side-channel schema file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedRecord {
    pub collection: String,
    pub document: Document,
}

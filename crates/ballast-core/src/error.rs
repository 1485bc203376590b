use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BallastError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Primary store unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Content store upload failed: {0}")]
    Upload(String),

    #[error("Ledger append failed for uploaded blob {content_id}: {reason}")]
    LedgerAppend { content_id: String, reason: String },

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Content store error: {0}")]
    ContentStore(String),

    #[error("Integrity check failed for backup {backup_id}: expected checksum {expected}, got {actual}")]
    Integrity {
        backup_id: String,
        expected: String,
        actual: String,
    },

    #[error("Another backup or restore operation is already in progress")]
    ConcurrencyRejected,

    #[error("Read-only mode: primary store unavailable")]
    ReadOnlyMode,

    #[error("Safe-mode cache unavailable: {0}")]
    SafeModeUnavailable(String),

    #[error("Destructive restore blocked: collection '{collection}' holds {existing} documents but the backup would restore only {incoming} (pass force to override)")]
    RestoreBlocked {
        collection: String,
        existing: u64,
        incoming: u64,
    },

    #[error("Restore failed at chain element {backup_id} (applied so far: {applied:?}): {source}")]
    ChainElementFailed {
        backup_id: String,
        applied: Vec<String>,
        #[source]
        source: Box<BallastError>,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BallastError>;

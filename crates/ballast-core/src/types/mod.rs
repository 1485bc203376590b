pub mod document;
pub mod record;

pub use document::{Document, TaggedRecord};
pub use record::{
    fold_ledger_entries, BackupId, BackupKind, BackupRecord, BackupStatus, ContentId, LedgerEntry,
    SnapshotStats, TxRef,
};

//! Ballast Core: types, errors, and collaborator traits for the backup /
//! disaster-recovery subsystem
//!
//! This crate defines the seams the coordinators are built against:
//! - Primary store: the document database being protected (CRUD data source)
//! - Content store: content-addressed blob put/get
//! - Ledger: ordered, tamper-evident append log holding backup pointers
//!
//! The ledger copy of a backup record is authoritative; every local mirror is
//! a disposable cache rebuildable entirely from ledger contents.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::{BackupConfig, CollectionSpec, GatewayConfig, SafeModeConfig};
pub use error::{BallastError, Result};
pub use traits::{ContentStore, HealthProbe, Ledger, PrimaryStore, PrimaryStoreProbe};
pub use types::{
    fold_ledger_entries, BackupId, BackupKind, BackupRecord, BackupStatus, ContentId, Document,
    LedgerEntry, SnapshotStats, TaggedRecord, TxRef,
};

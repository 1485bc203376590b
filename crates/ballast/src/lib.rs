//! Ballast: backup / disaster-recovery subsystem
//!
//! Ballast snapshots a primary document store, uploads snapshots to
//! content-addressed object storage, anchors an immutable pointer (content
//! hash + metadata) on a permissioned ledger, and can reconstruct system
//! state, including authentication credentials, from the ledger pointer
//! and object storage alone, never trusting the primary database as the
//! source of truth.
//!
//! # Quick Start
//!
//! ```no_run
//! use ballast::prelude::*;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let primary = Arc::new(MemoryPrimaryStore::new());
//! let content = Arc::new(MemoryContentStore::new());
//! let ledger = Arc::new(MemoryLedger::new());
//!
//! let config = BackupConfig::new(vec![
//!     CollectionSpec::new("users").safe_mode_eligible(),
//!     CollectionSpec::new("products"),
//!     CollectionSpec::new("orders"),
//! ]);
//!
//! let system = Ballast::new(primary, content, ledger, config,
//!     SafeModeConfig::default(), "./data");
//!
//! let record = system.backup().create_full_backup(Some("nightly".into())).await?;
//! println!("anchored {} -> {}", record.backup_id, record.content_id);
//!
//! let result = system
//!     .restore()
//!     .restore_from_backup(BackupSelector::Latest, RestoreOptions::default())
//!     .await?;
//! println!("restored {:?}", result.restored_counts);
//! # Ok(())
//! # }
//! ```

pub mod backup;
pub mod content_store;
pub mod ledger;
pub mod local_index;
pub mod prelude;
pub mod primary;
pub mod restore;
pub mod safe_mode;
pub mod snapshot;
pub mod system;

// Re-export core types
pub use ballast_core::{
    fold_ledger_entries, BackupConfig, BackupId, BackupKind, BackupRecord, BackupStatus,
    BallastError, CollectionSpec, ContentId, ContentStore, Document, GatewayConfig, HealthProbe,
    Ledger, LedgerEntry, PrimaryStore, PrimaryStoreProbe, Result, SafeModeConfig, SnapshotStats,
    TaggedRecord, TxRef,
};

// Re-export main types from this crate
pub use backup::{operation_lock, BackupCoordinator, BackupOutcome, OperationLock};
pub use content_store::{HttpContentStore, MemoryContentStore};
pub use ledger::{HttpLedger, MemoryLedger};
pub use local_index::{IndexFile, LocalIndex};
pub use primary::{HttpPrimaryStore, MemoryPrimaryStore};
pub use restore::{BackupSelector, RestoreCoordinator, RestoreOptions, RestoreResult};
pub use safe_mode::{GateState, SafeModeGate, SafeModeRead};
pub use snapshot::{decode_snapshot, Snapshot, SnapshotBuild, SnapshotBuilder};
pub use system::Ballast;

//! Ballast Prelude
//!
//! Import this to get all commonly used types and traits:
//!
//! ```
//! use ballast::prelude::*;
//! ```

// Core types
pub use crate::{
    BackupId, BackupKind, BackupRecord, BackupStatus, BallastError, ContentId, Document, Result,
    SnapshotStats, TaggedRecord,
};

// Configs
pub use crate::{BackupConfig, CollectionSpec, GatewayConfig, SafeModeConfig};

// Traits
pub use crate::{ContentStore, HealthProbe, Ledger, PrimaryStore};

// Coordinators and gate
pub use crate::{
    Ballast, BackupCoordinator, BackupOutcome, BackupSelector, GateState, RestoreCoordinator,
    RestoreOptions, RestoreResult, SafeModeGate, SafeModeRead,
};

// Implementations
pub use crate::{
    HttpContentStore, HttpLedger, HttpPrimaryStore, MemoryContentStore, MemoryLedger,
    MemoryPrimaryStore,
};

// Re-export common external deps
pub use anyhow;
pub use serde::{Deserialize, Serialize};
pub use std::sync::Arc;
pub use tracing;

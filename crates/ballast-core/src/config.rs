//! Configuration for the backup subsystem
//!
//! Plain structs with sensible defaults; anything credential-like is built
//! with a `from_env()` constructor on the client that needs it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One primary-store collection covered by backup and restore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Collection name in the primary store
    pub name: String,

    /// Whether this collection may be served from the safe-mode cache while
    /// the primary store is down (e.g. `users` for authentication lookups)
    #[serde(default)]
    pub safe_mode_eligible: bool,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            safe_mode_eligible: false,
        }
    }

    pub fn safe_mode_eligible(mut self) -> Self {
        self.safe_mode_eligible = true;
        self
    }
}

/// Backup coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Collections included in every snapshot
    pub collections: Vec<CollectionSpec>,

    /// Retention: number of most-recent full backups (plus their dependent
    /// incremental chains) to keep active
    pub keep_full_backups: usize,

    /// Gzip compression level (0-9)
    pub compression_level: u32,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            collections: Vec::new(),
            keep_full_backups: 7,
            compression_level: 6,
        }
    }
}

impl BackupConfig {
    pub fn new(collections: Vec<CollectionSpec>) -> Self {
        Self {
            collections,
            ..Self::default()
        }
    }

    pub fn with_retention(mut self, keep_full_backups: usize) -> Self {
        self.keep_full_backups = keep_full_backups;
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }
}

/// Safe-mode gate configuration
#[derive(Debug, Clone)]
pub struct SafeModeConfig {
    /// Probe attempts before declaring the primary store degraded
    pub probe_retries: u32,

    /// Delay between probe attempts
    pub probe_backoff: Duration,
}

impl Default for SafeModeConfig {
    fn default() -> Self {
        Self {
            probe_retries: 3,
            probe_backoff: Duration::from_millis(250),
        }
    }
}

/// Connection settings for an HTTP gateway client (content store, ledger,
/// or primary-store CRUD API).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the gateway, e.g. `https://gateway.example.com`
    pub base_url: String,

    /// Per-request timeout; network calls never hang indefinitely
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

//! Safe-mode fallback gate
//!
//! A decision gate in front of every read and write entrypoint that touches
//! the primary store. While the primary is unreachable (`Degraded`), writes
//! fail fast with `ReadOnlyMode` and eligible reads are served from an
//! in-memory cache built from the latest ledger-anchored backup. The cache is
//! an immutable snapshot behind an `Arc` that is swapped atomically and
//! discarded unconditionally the moment the primary store recovers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;

use ballast_core::{
    BackupId, BallastError, Document, HealthProbe, PrimaryStore, Result, SafeModeConfig,
};

use crate::restore::RestoreCoordinator;

/// Gate state, driven by the injected health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GateState {
    Normal,
    Degraded,
}

/// A read answer with an explicit marker so downstream consumers never
/// confuse degraded-cache data with live primary-store data.
#[derive(Debug, Clone, Serialize)]
pub struct SafeModeRead<T> {
    pub value: T,
    pub safe_mode: bool,
}

struct SafeModeCache {
    backup_id: BackupId,
    collections: HashMap<String, HashMap<String, Document>>,
}

pub struct SafeModeGate {
    primary: Arc<dyn PrimaryStore>,
    restore: Arc<RestoreCoordinator>,
    probe: Arc<dyn HealthProbe>,
    config: SafeModeConfig,
    /// Collections servable from cache while degraded
    eligible: Vec<String>,
    state: RwLock<GateState>,
    /// Immutable once populated for the duration of a degraded episode;
    /// replaced by swapping the Arc, never mutated in place.
    cache: RwLock<Option<Arc<SafeModeCache>>>,
    populate_lock: AsyncMutex<()>,
}

impl SafeModeGate {
    pub fn new(
        primary: Arc<dyn PrimaryStore>,
        restore: Arc<RestoreCoordinator>,
        probe: Arc<dyn HealthProbe>,
        config: SafeModeConfig,
        eligible: Vec<String>,
    ) -> Self {
        Self {
            primary,
            restore,
            probe,
            config,
            eligible,
            state: RwLock::new(GateState::Normal),
            cache: RwLock::new(None),
            populate_lock: AsyncMutex::new(()),
        }
    }

    pub fn state(&self) -> GateState {
        *self.state.read()
    }

    /// Backup id backing the current safe-mode cache, if one is populated.
    pub fn cached_backup_id(&self) -> Option<BackupId> {
        self.cache.read().as_ref().map(|c| c.backup_id.clone())
    }

    /// Run the health probe and apply state transitions.
    ///
    /// `Normal -> Degraded` requires the probe to fail past the retry
    /// budget; `Degraded -> Normal` happens on the first success and
    /// discards the cache unconditionally; it is never authoritative once
    /// the primary store is reachable again.
    pub async fn probe_and_update(&self) -> GateState {
        match self.state() {
            GateState::Normal => {
                for attempt in 1..=self.config.probe_retries.max(1) {
                    if self.probe.probe().await.is_ok() {
                        return GateState::Normal;
                    }
                    tracing::warn!(attempt, "primary store health probe failed");
                    if attempt < self.config.probe_retries.max(1) {
                        tokio::time::sleep(self.config.probe_backoff).await;
                    }
                }
                tracing::warn!("primary store degraded, entering safe mode");
                *self.state.write() = GateState::Degraded;
                GateState::Degraded
            }
            GateState::Degraded => {
                if self.probe.probe().await.is_ok() {
                    tracing::info!("primary store recovered, leaving safe mode");
                    *self.cache.write() = None;
                    *self.state.write() = GateState::Normal;
                    GateState::Normal
                } else {
                    GateState::Degraded
                }
            }
        }
    }

    /// Fails fast with `ReadOnlyMode` while degraded; writes are never
    /// queued or silently dropped.
    pub fn ensure_writable(&self) -> Result<()> {
        match self.state() {
            GateState::Normal => Ok(()),
            GateState::Degraded => Err(BallastError::ReadOnlyMode),
        }
    }

    /// Gated write entrypoint.
    pub async fn upsert_by_id(&self, collection: &str, doc: Document) -> Result<()> {
        self.ensure_writable()?;
        self.primary.upsert_by_id(collection, doc).await
    }

    /// Gated delete entrypoint.
    pub async fn delete_all(&self, collection: &str) -> Result<u64> {
        self.ensure_writable()?;
        self.primary.delete_all(collection).await
    }

    /// Gated read entrypoint.
    ///
    /// While degraded, an eligible collection is answered from the cache
    /// (`safe_mode: true`); `Ok(None)` means the document genuinely does not
    /// exist in the latest backup, while a population failure surfaces as
    /// `SafeModeUnavailable` so callers can tell "no such user" apart from
    /// "cannot currently verify".
    pub async fn read_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<SafeModeRead<Option<Document>>> {
        match self.state() {
            GateState::Normal => {
                let value = self.primary.find_by_id(collection, id).await?;
                Ok(SafeModeRead {
                    value,
                    safe_mode: false,
                })
            }
            GateState::Degraded => {
                if !self.eligible.iter().any(|c| c == collection) {
                    return Err(BallastError::SourceUnavailable(format!(
                        "collection '{}' is not safe-mode eligible",
                        collection
                    )));
                }
                let cache = self.ensure_cache().await?;
                let value = cache
                    .collections
                    .get(collection)
                    .and_then(|docs| docs.get(id).cloned());
                Ok(SafeModeRead {
                    value,
                    safe_mode: true,
                })
            }
        }
    }

    /// Lazily populate the cache from the latest ledger-anchored backup.
    /// Concurrent readers either see the previous fully built snapshot or
    /// wait here, never seeing a half-populated cache.
    async fn ensure_cache(&self) -> Result<Arc<SafeModeCache>> {
        if let Some(cache) = self.cache.read().clone() {
            return Ok(cache);
        }

        let _populate = self.populate_lock.lock().await;
        // Another reader may have finished populating while we waited.
        if let Some(cache) = self.cache.read().clone() {
            return Ok(cache);
        }

        let (backup_id, collections) = self
            .restore
            .load_collections(&self.eligible)
            .await
            .map_err(|e| BallastError::SafeModeUnavailable(e.to_string()))?;

        tracing::info!(
            backup_id = %backup_id,
            collections = collections.len(),
            "safe-mode cache populated"
        );

        let cache = Arc::new(SafeModeCache {
            backup_id,
            collections,
        });
        *self.cache.write() = Some(cache.clone());
        Ok(cache)
    }
}

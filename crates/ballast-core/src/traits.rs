//! Capability traits for the three external collaborators
//!
//! The coordinators only ever see these seams; concrete implementations
//! (HTTP gateways, in-memory fault-injectable stores) live in the `ballast`
//! crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{ContentId, Document, LedgerEntry, TxRef};

/// The primary document store, treated as a CRUD data source.
///
/// Read paths used by the snapshot builder, write paths by restore. All
/// failures map to `SourceUnavailable` so the coordinators can fail a whole
/// operation atomically.
#[async_trait]
pub trait PrimaryStore: Send + Sync {
    /// Connectivity probe; `Ok(())` means the store is reachable.
    async fn health_check(&self) -> Result<()>;

    async fn count_documents(&self, collection: &str) -> Result<u64>;

    async fn find_all(&self, collection: &str) -> Result<Vec<Document>>;

    /// Documents whose `modified_at` is strictly greater than `since`.
    async fn find_modified_since(
        &self,
        collection: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Document>>;

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Remove every document; returns the number deleted.
    async fn delete_all(&self, collection: &str) -> Result<u64>;

    async fn bulk_insert(&self, collection: &str, docs: Vec<Document>) -> Result<u64>;

    async fn upsert_by_id(&self, collection: &str, doc: Document) -> Result<()>;

    /// Rename `from` over `to`, replacing `to` wholesale. Used to swap a
    /// fully staged collection over its target so a crash mid-replace never
    /// leaves a half-written collection.
    async fn rename_collection(&self, from: &str, to: &str) -> Result<()>;
}

/// Content-addressed blob storage. Identical bytes always yield the
/// identical `ContentId`; no update-in-place operation exists.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn put(&self, bytes: &[u8]) -> Result<ContentId>;

    async fn get(&self, id: &ContentId) -> Result<Vec<u8>>;
}

/// The permissioned ledger: an ordered, tamper-evident append log.
///
/// `append` never partially commits; all reads reflect only committed data,
/// and `get_all` returns entries in committed append order (this is what
/// makes the chain-walk invariant hold without coordinator-side ordering).
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn append(&self, key: &str, entry: LedgerEntry) -> Result<TxRef>;

    async fn get_by_key(&self, key: &str) -> Result<Option<LedgerEntry>>;

    async fn get_all(&self) -> Result<Vec<(String, LedgerEntry)>>;
}

/// Injectable connectivity probe for the safe-mode gate, so failover is
/// exercised by fault injection rather than by sabotaging configuration.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn probe(&self) -> Result<()>;
}

/// Probe backed by a `PrimaryStore`'s own connectivity check.
pub struct PrimaryStoreProbe(pub std::sync::Arc<dyn PrimaryStore>);

#[async_trait]
impl HealthProbe for PrimaryStoreProbe {
    async fn probe(&self) -> Result<()> {
        self.0.health_check().await
    }
}

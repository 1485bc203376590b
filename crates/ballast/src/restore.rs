//! Restore coordinator
//!
//! Resolves a ledger-anchored backup pointer, fetches and verifies the blob
//! chain from the content store, and replays it into the primary store.
//! Resolution works from the ledger alone: it must succeed even when both
//! the local index and the primary store are empty, because the ledger, not
//! the database, is the durable source of truth.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use ballast_core::{
    fold_ledger_entries, BackupId, BackupKind, BackupRecord, BackupStatus, BallastError,
    ContentStore, Document, Ledger, PrimaryStore, Result,
};

use crate::backup::{chain_root, OperationLock};
use crate::snapshot::{checksum_hex, decode_snapshot};

/// Suffix of the temporary collection a full replace is staged into before
/// being swapped over the target.
const STAGING_SUFFIX: &str = "__restore";

/// Which backup to restore.
#[derive(Debug, Clone)]
pub enum BackupSelector {
    /// Most recent ACTIVE record by `created_at`
    Latest,
    Id(BackupId),
}

impl BackupSelector {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("latest") {
            Self::Latest
        } else {
            Self::Id(BackupId::from(s))
        }
    }
}

/// Restore options.
#[derive(Debug, Clone)]
pub struct RestoreOptions {
    /// Refuse a destructive full replace when a target collection currently
    /// holds more documents than the backup would restore
    pub guard_overwrite: bool,

    /// Explicit override of the overwrite guard
    pub force: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            guard_overwrite: true,
            force: false,
        }
    }
}

/// Structured result of a restore run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreResult {
    /// The record the selector resolved to (the chain tip)
    pub backup_id: BackupId,

    /// Chain elements applied, in creation order
    pub chain: Vec<BackupId>,

    /// Documents restored per collection
    pub restored_counts: BTreeMap<String, u64>,

    pub duration_ms: u64,
}

pub struct RestoreCoordinator {
    primary: Arc<dyn PrimaryStore>,
    content: Arc<dyn ContentStore>,
    ledger: Arc<dyn Ledger>,
    lock: OperationLock,
}

impl RestoreCoordinator {
    pub fn new(
        primary: Arc<dyn PrimaryStore>,
        content: Arc<dyn ContentStore>,
        ledger: Arc<dyn Ledger>,
        lock: OperationLock,
    ) -> Self {
        Self {
            primary,
            content,
            ledger,
            lock,
        }
    }

    async fn authoritative_records(&self) -> Result<Vec<BackupRecord>> {
        let entries = self.ledger.get_all().await?;
        Ok(fold_ledger_entries(entries.iter().map(|(_, e)| e)))
    }

    fn resolve<'a>(
        selector: &BackupSelector,
        records: &'a [BackupRecord],
    ) -> Result<&'a BackupRecord> {
        match selector {
            BackupSelector::Latest => records
                .iter()
                .filter(|r| r.status == BackupStatus::Active)
                .max_by(|a, b| {
                    a.created_at
                        .cmp(&b.created_at)
                        .then_with(|| a.backup_id.cmp(&b.backup_id))
                })
                .ok_or_else(|| {
                    BallastError::NotFound("no active backup record on the ledger".to_string())
                }),
            BackupSelector::Id(id) => records
                .iter()
                .find(|r| &r.backup_id == id)
                .ok_or_else(|| BallastError::NotFound(format!("no backup record {}", id))),
        }
    }

    /// Ordered chain [FULL, INCR1, INCR2, ..] ending at `tip`.
    fn resolve_chain(tip: &BackupRecord, records: &[BackupRecord]) -> Result<Vec<BackupRecord>> {
        // Validates every parent link before any replay starts.
        chain_root(tip, records)?;

        let mut chain = vec![tip.clone()];
        let mut current = tip.clone();
        while let Some(parent_id) = current.parent_backup_id.clone() {
            current = records
                .iter()
                .find(|r| r.backup_id == parent_id)
                .cloned()
                .ok_or_else(|| {
                    BallastError::NotFound(format!(
                        "broken backup chain: parent {} not on ledger",
                        parent_id
                    ))
                })?;
            chain.push(current.clone());
        }
        chain.reverse();
        Ok(chain)
    }

    /// Replay a backup chain into the primary store.
    ///
    /// On any chain-element failure the walk stops and the error reports
    /// which prefix of the chain had already been applied, so a partial restore
    /// is visible, never silently swallowed.
    pub async fn restore_from_backup(
        &self,
        selector: BackupSelector,
        opts: RestoreOptions,
    ) -> Result<RestoreResult> {
        let _guard = self
            .lock
            .try_lock()
            .map_err(|_| BallastError::ConcurrencyRejected)?;

        let started = Instant::now();
        let records = self.authoritative_records().await?;
        let tip = Self::resolve(&selector, &records)?.clone();
        let chain = Self::resolve_chain(&tip, &records)?;

        tracing::info!(
            backup_id = %tip.backup_id,
            chain_len = chain.len(),
            "starting restore"
        );

        let mut applied: Vec<BackupId> = Vec::new();
        let mut restored_counts: BTreeMap<String, u64> = BTreeMap::new();

        for element in &chain {
            self.apply_element(element, &opts, &mut restored_counts)
                .await
                .map_err(|e| BallastError::ChainElementFailed {
                    backup_id: element.backup_id.to_string(),
                    applied: applied.iter().map(|id| id.to_string()).collect(),
                    source: Box::new(e),
                })?;
            applied.push(element.backup_id.clone());
        }

        let result = RestoreResult {
            backup_id: tip.backup_id.clone(),
            chain: applied,
            restored_counts,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        tracing::info!(
            backup_id = %result.backup_id,
            documents = result.restored_counts.values().sum::<u64>(),
            duration_ms = result.duration_ms,
            "restore complete"
        );
        Ok(result)
    }

    /// Fetch, verify, and replay one chain element.
    async fn apply_element(
        &self,
        record: &BackupRecord,
        opts: &RestoreOptions,
        restored_counts: &mut BTreeMap<String, u64>,
    ) -> Result<()> {
        let tagged = self.fetch_and_verify(record).await?;
        let mut grouped: BTreeMap<String, Vec<Document>> = BTreeMap::new();
        for item in tagged {
            grouped.entry(item.collection).or_default().push(item.document);
        }

        match record.kind {
            BackupKind::Full => {
                // Wholesale replace in three phases over every collection the
                // snapshot recorded (empty ones included; an empty collection
                // is state): guard all, stage all, then swap. A blocked
                // restore must be a complete no-op, so no collection is
                // touched until every guard has passed, and no live
                // collection is swapped until every staging collection is
                // fully built.
                let collections: Vec<(String, Vec<Document>)> = record
                    .stats
                    .document_counts
                    .keys()
                    .map(|c| (c.clone(), grouped.remove(c).unwrap_or_default()))
                    .collect();

                if opts.guard_overwrite && !opts.force {
                    for (collection, docs) in &collections {
                        let incoming = docs.len() as u64;
                        let existing = self.primary.count_documents(collection).await?;
                        if existing > incoming {
                            return Err(BallastError::RestoreBlocked {
                                collection: collection.clone(),
                                existing,
                                incoming,
                            });
                        }
                    }
                }

                let mut staged: Vec<(String, u64)> = Vec::with_capacity(collections.len());
                for (collection, docs) in collections {
                    let incoming = docs.len() as u64;
                    let staging = format!("{}{}", collection, STAGING_SUFFIX);
                    self.primary.delete_all(&staging).await?;
                    self.primary.bulk_insert(&staging, docs).await?;
                    staged.push((collection, incoming));
                }

                for (collection, incoming) in staged {
                    let staging = format!("{}{}", collection, STAGING_SUFFIX);
                    self.primary.rename_collection(&staging, &collection).await?;
                    restored_counts.insert(collection.clone(), incoming);
                    tracing::debug!(collection = %collection, documents = incoming, "collection replaced");
                }
            }
            BackupKind::Incremental => {
                for (collection, docs) in grouped {
                    let count = docs.len() as u64;
                    for doc in docs {
                        self.primary.upsert_by_id(&collection, doc).await?;
                    }
                    *restored_counts.entry(collection).or_insert(0) += count;
                }
            }
        }
        Ok(())
    }

    async fn fetch_and_verify(
        &self,
        record: &BackupRecord,
    ) -> Result<Vec<ballast_core::TaggedRecord>> {
        let bytes = self.content.get(&record.content_id).await?;
        let actual = checksum_hex(&bytes);
        if actual != record.stats.checksum {
            return Err(BallastError::Integrity {
                backup_id: record.backup_id.to_string(),
                expected: record.stats.checksum.clone(),
                actual,
            });
        }
        decode_snapshot(&bytes)
    }

    /// Read-only subset load for the safe-mode gate: resolve the latest
    /// active chain and materialize the named collections into in-memory
    /// maps, writing nothing to the primary store. Does not take the
    /// operation lock; it runs precisely when the primary store is down.
    pub async fn load_collections(
        &self,
        names: &[String],
    ) -> Result<(BackupId, HashMap<String, HashMap<String, Document>>)> {
        let records = self.authoritative_records().await?;
        let tip = Self::resolve(&BackupSelector::Latest, &records)?.clone();
        let chain = Self::resolve_chain(&tip, &records)?;

        let mut loaded: HashMap<String, HashMap<String, Document>> = HashMap::new();
        for element in &chain {
            let tagged = self.fetch_and_verify(element).await?;

            if element.kind == BackupKind::Full {
                // A full element replaces the state of every collection it
                // covers, including ones it recorded as empty.
                for collection in element.stats.document_counts.keys() {
                    if names.contains(collection) {
                        loaded.insert(collection.clone(), HashMap::new());
                    }
                }
            }

            for item in tagged {
                if names.contains(&item.collection) {
                    loaded
                        .entry(item.collection)
                        .or_default()
                        .insert(item.document.id.clone(), item.document);
                }
            }
        }

        tracing::info!(
            backup_id = %tip.backup_id,
            collections = names.len(),
            "loaded read-only snapshot subset"
        );
        Ok((tip.backup_id.clone(), loaded))
    }
}

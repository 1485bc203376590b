//! Backup coordinator
//!
//! Orchestrates snapshot cycles: build → compress → upload to the content
//! store → append the pointer record to the ledger → mirror into the local
//! index. A backup record exists only once the ledger append succeeds; an
//! uploaded blob whose append fails is a harmless content-addressed orphan
//! and is reported, never silently retried.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Timelike, Utc};
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use ballast_core::{
    fold_ledger_entries, BackupConfig, BackupId, BackupKind, BackupRecord, BackupStatus,
    BallastError, ContentStore, Ledger, LedgerEntry, PrimaryStore, Result,
};

use crate::local_index::{IndexFile, LocalIndex};
use crate::snapshot::{Snapshot, SnapshotBuild, SnapshotBuilder};

/// Exclusive lock shared by the backup and restore coordinators: one
/// backup-family operation at a time per deployment. Acquisition is scoped:
/// the guard releases on every exit path, including panics.
pub type OperationLock = Arc<AsyncMutex<()>>;

pub fn operation_lock() -> OperationLock {
    Arc::new(AsyncMutex::new(()))
}

/// Outcome of an incremental backup attempt.
#[derive(Debug)]
pub enum BackupOutcome {
    Created(BackupRecord),
    /// Zero documents changed since the watermark: nothing was uploaded,
    /// nothing was appended, nothing was recorded locally.
    Skipped,
}

pub struct BackupCoordinator {
    primary: Arc<dyn PrimaryStore>,
    content: Arc<dyn ContentStore>,
    ledger: Arc<dyn Ledger>,
    config: BackupConfig,
    index: LocalIndex,
    lock: OperationLock,
    // Monotonic guard: ids have second resolution, so two operations inside
    // the same second must not collide.
    last_created_at: Mutex<Option<DateTime<Utc>>>,
}

impl BackupCoordinator {
    pub fn new(
        primary: Arc<dyn PrimaryStore>,
        content: Arc<dyn ContentStore>,
        ledger: Arc<dyn Ledger>,
        config: BackupConfig,
        index_dir: impl AsRef<Path>,
        lock: OperationLock,
    ) -> Self {
        Self {
            primary,
            content,
            ledger,
            config,
            index: LocalIndex::new(index_dir),
            lock,
            last_created_at: Mutex::new(None),
        }
    }

    fn builder(&self) -> SnapshotBuilder {
        SnapshotBuilder::new(
            self.primary.clone(),
            self.config.collections.clone(),
            self.config.compression_level,
        )
    }

    fn next_created_at(&self) -> DateTime<Utc> {
        let now = Utc::now();
        let now = now.with_nanosecond(0).unwrap_or(now);
        let mut last = self.last_created_at.lock();
        let next = match *last {
            Some(prev) if now <= prev => prev + chrono::Duration::seconds(1),
            _ => now,
        };
        *last = Some(next);
        next
    }

    /// Authoritative record set, folded from the ledger.
    async fn authoritative_records(&self) -> Result<Vec<BackupRecord>> {
        let entries = self.ledger.get_all().await?;
        Ok(fold_ledger_entries(entries.iter().map(|(_, e)| e)))
    }

    /// Snapshot every configured collection and anchor the result.
    pub async fn create_full_backup(&self, label: Option<String>) -> Result<BackupRecord> {
        let _guard = self
            .lock
            .try_lock()
            .map_err(|_| BallastError::ConcurrencyRejected)?;

        tracing::info!(?label, "starting full backup");
        // Captured before the read: documents modified while the snapshot is
        // being built stay visible to the next incremental.
        let watermark = Utc::now();
        let snapshot = self.builder().build_full().await?;
        let record = self
            .anchor(snapshot, BackupKind::Full, None, label, watermark)
            .await?;

        tracing::info!(
            backup_id = %record.backup_id,
            content_id = %record.content_id,
            documents = record.stats.total_documents(),
            "full backup complete"
        );
        Ok(record)
    }

    /// Snapshot documents modified since the watermark and anchor the result,
    /// or skip when nothing changed.
    pub async fn create_incremental_backup(&self) -> Result<BackupOutcome> {
        let _guard = self
            .lock
            .try_lock()
            .map_err(|_| BallastError::ConcurrencyRejected)?;

        let records = self.authoritative_records().await?;
        let parent = records
            .iter()
            .filter(|r| r.status == BackupStatus::Active)
            .next_back()
            .cloned()
            .ok_or_else(|| {
                BallastError::NotFound(
                    "no active backup to base an incremental on; run a full backup first"
                        .to_string(),
                )
            })?;

        // Watermark advanced only on successful completion; when the local
        // index is gone it is rebuilt from the latest active ledger record.
        let since = self
            .index
            .load()?
            .watermark
            .unwrap_or(parent.created_at);

        tracing::info!(parent = %parent.backup_id, %since, "starting incremental backup");

        let watermark = Utc::now();
        match self.builder().build_incremental(since).await? {
            SnapshotBuild::NoChanges => Ok(BackupOutcome::Skipped),
            SnapshotBuild::Snapshot(snapshot) => {
                let record = self
                    .anchor(
                        snapshot,
                        BackupKind::Incremental,
                        Some(parent.backup_id.clone()),
                        None,
                        watermark,
                    )
                    .await?;
                tracing::info!(
                    backup_id = %record.backup_id,
                    parent = %parent.backup_id,
                    documents = record.stats.total_documents(),
                    "incremental backup complete"
                );
                Ok(BackupOutcome::Created(record))
            }
        }
    }

    /// Upload the blob, append the pointer record, mirror locally.
    async fn anchor(
        &self,
        snapshot: Snapshot,
        kind: BackupKind,
        parent_backup_id: Option<BackupId>,
        label: Option<String>,
        watermark: DateTime<Utc>,
    ) -> Result<BackupRecord> {
        let content_id = self.content.put(&snapshot.bytes).await?;

        let created_at = self.next_created_at();
        let backup_id = BackupId::generate(kind, created_at);
        let record = BackupRecord {
            backup_id: backup_id.clone(),
            kind,
            content_id: content_id.clone(),
            status: BackupStatus::Active,
            parent_backup_id,
            stats: snapshot.stats,
            label,
            created_at,
        };

        // The record exists only once this append succeeds. On failure the
        // uploaded blob is orphaned (content-addressed, harmless) and the
        // caller decides what to do; we never re-upload automatically.
        self.ledger
            .append(backup_id.as_str(), LedgerEntry::Backup(record.clone()))
            .await
            .map_err(|e| BallastError::LedgerAppend {
                content_id: content_id.0.clone(),
                reason: e.to_string(),
            })?;

        self.mirror(&record, watermark);
        Ok(record)
    }

    /// Mirror a freshly anchored record into the local index and advance the
    /// watermark. The ledger already holds the truth, so a local-disk failure
    /// here is logged and swallowed.
    fn mirror(&self, record: &BackupRecord, watermark: DateTime<Utc>) {
        let result = self.index.load().and_then(|mut file| {
            file.records.retain(|r| r.backup_id != record.backup_id);
            file.records.push(record.clone());
            file.watermark = Some(watermark);
            self.index.save(&file)
        });
        if let Err(e) = result {
            tracing::warn!(backup_id = %record.backup_id, error = %e, "failed to mirror record into local index");
        }
    }

    /// Authoritative listing, rebuilt from the ledger; the local index is
    /// rewritten as a side effect (the delete-cache-and-rebuild contract).
    pub async fn list_backups(&self) -> Result<Vec<BackupRecord>> {
        let records = self.authoritative_records().await?;

        let watermark = self.index.load().map(|f| f.watermark).unwrap_or(None);
        let rebuilt = IndexFile {
            records: records.clone(),
            watermark: watermark.or_else(|| {
                records
                    .iter()
                    .filter(|r| r.status == BackupStatus::Active)
                    .map(|r| r.created_at)
                    .max()
            }),
        };
        if let Err(e) = self.index.save(&rebuilt) {
            tracing::warn!(error = %e, "failed to rewrite local index");
        }

        Ok(records)
    }

    /// Explicit operator transition of a record to FAILED.
    pub async fn mark_backup_failed(&self, backup_id: &BackupId) -> Result<BackupRecord> {
        let records = self.authoritative_records().await?;
        let mut record = records
            .into_iter()
            .find(|r| &r.backup_id == backup_id)
            .ok_or_else(|| BallastError::NotFound(format!("no backup record {}", backup_id)))?;

        self.append_status_change(backup_id, BackupStatus::Failed)
            .await?;
        record.status = BackupStatus::Failed;

        tracing::warn!(backup_id = %backup_id, "backup marked failed");
        self.list_backups().await?;
        Ok(record)
    }

    /// Retention: keep the newest N full backups plus their dependent
    /// incremental chains; everything older gets a superseding status append.
    /// The original ledger entries are untouched; pruning is purely logical.
    pub async fn cleanup_old_backups(&self) -> Result<Vec<BackupId>> {
        let _guard = self
            .lock
            .try_lock()
            .map_err(|_| BallastError::ConcurrencyRejected)?;

        let records = self.authoritative_records().await?;

        let mut active_fulls: Vec<&BackupRecord> = records
            .iter()
            .filter(|r| r.kind == BackupKind::Full && r.status == BackupStatus::Active)
            .collect();
        active_fulls.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let keep: Vec<BackupId> = active_fulls
            .iter()
            .take(self.config.keep_full_backups)
            .map(|r| r.backup_id.clone())
            .collect();

        let mut superseded = Vec::new();
        for record in records
            .iter()
            .filter(|r| r.status == BackupStatus::Active)
        {
            let root = chain_root(record, &records)?;
            if !keep.contains(&root) {
                self.append_status_change(&record.backup_id, BackupStatus::Superseded)
                    .await?;
                tracing::info!(backup_id = %record.backup_id, "backup superseded by retention policy");
                superseded.push(record.backup_id.clone());
            }
        }

        // Refresh the mirror with the transitions just recorded.
        let entries = self.ledger.get_all().await?;
        let refreshed = fold_ledger_entries(entries.iter().map(|(_, e)| e));
        let watermark = self.index.load().map(|f| f.watermark).unwrap_or(None);
        if let Err(e) = self.index.save(&IndexFile {
            records: refreshed,
            watermark,
        }) {
            tracing::warn!(error = %e, "failed to rewrite local index");
        }

        Ok(superseded)
    }

    async fn append_status_change(
        &self,
        backup_id: &BackupId,
        status: BackupStatus,
    ) -> Result<()> {
        let entry = LedgerEntry::StatusChange {
            backup_id: backup_id.clone(),
            status,
            changed_at: Utc::now(),
        };
        self.ledger
            .append(&format!("{}/status", backup_id), entry)
            .await?;
        Ok(())
    }
}

/// Walk parent links back to the full backup rooting `record`'s chain.
pub(crate) fn chain_root(record: &BackupRecord, all: &[BackupRecord]) -> Result<BackupId> {
    let mut current = record;
    loop {
        match (&current.kind, &current.parent_backup_id) {
            (BackupKind::Full, _) => return Ok(current.backup_id.clone()),
            (BackupKind::Incremental, Some(parent_id)) => {
                current = all
                    .iter()
                    .find(|r| &r.backup_id == parent_id)
                    .ok_or_else(|| {
                        BallastError::NotFound(format!(
                            "broken backup chain: parent {} of {} not on ledger",
                            parent_id, record.backup_id
                        ))
                    })?;
            }
            (BackupKind::Incremental, None) => {
                return Err(BallastError::NotFound(format!(
                    "incremental backup {} has no parent link",
                    record.backup_id
                )))
            }
        }
    }
}

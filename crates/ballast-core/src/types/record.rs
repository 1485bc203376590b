use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Backup type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    Full,
    Incremental,
}

impl BackupKind {
    /// Identifier prefix for this kind (`FULL` / `INCR`)
    pub fn tag(&self) -> &'static str {
        match self {
            BackupKind::Full => "FULL",
            BackupKind::Incremental => "INCR",
        }
    }
}

/// Backup record lifecycle status
///
/// `Active` is the only status eligible for restore or safe-mode use.
/// Transitions are recorded as new ledger appends; the original entry is
/// never edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    Active,
    Failed,
    Superseded,
}

/// Globally unique, monotonic-sortable backup identifier.
///
/// Format: `{TYPE}_{yyyyMMdd}_{HHmmss}`, e.g. `FULL_20251204_130330`.
/// Lexicographically sortable by creation time within a type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackupId(String);

impl BackupId {
    pub fn generate(kind: BackupKind, at: DateTime<Utc>) -> Self {
        Self(format!("{}_{}", kind.tag(), at.format("%Y%m%d_%H%M%S")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BackupId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BackupId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Content address returned by the content store; immutable once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(pub String);

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ledger transaction reference returned by a committed append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxRef(pub String);

/// Integrity metadata produced by the snapshot builder.
///
/// The checksum covers the *compressed* bytes actually uploaded, so restore
/// verification is a single-pass check against exactly what the content
/// store holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotStats {
    /// Per-collection document counts
    pub document_counts: BTreeMap<String, u64>,

    /// Serialized size before compression
    pub uncompressed_bytes: u64,

    /// Size of the compressed blob as uploaded
    pub compressed_bytes: u64,

    /// Snapshot build duration in milliseconds
    pub duration_ms: u64,

    /// compressed / uncompressed (1.0 for an empty snapshot)
    pub compression_ratio: f64,

    /// Hex-encoded SHA-256 of the compressed bytes
    pub checksum: String,
}

impl SnapshotStats {
    pub fn total_documents(&self) -> u64 {
        self.document_counts.values().sum()
    }
}

/// The unit anchored on the ledger and mirrored in the local index.
///
/// The ledger copy is authoritative; the local mirror is a disposable cache
/// rebuildable entirely from ledger contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupRecord {
    pub backup_id: BackupId,

    pub kind: BackupKind,

    /// Content address of the uploaded snapshot blob
    pub content_id: ContentId,

    pub status: BackupStatus,

    /// Previous element in the backup chain (`None` for a full backup).
    /// Walking parents from any incremental reaches the root full backup.
    pub parent_backup_id: Option<BackupId>,

    pub stats: SnapshotStats,

    /// Optional operator-supplied label (full backups only)
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub label: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// One committed ledger entry.
///
/// Status transitions are separate appends so the original record entry is
/// never rewritten; folding all entries in append order yields the
/// authoritative record set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum LedgerEntry {
    Backup(BackupRecord),
    StatusChange {
        backup_id: BackupId,
        status: BackupStatus,
        changed_at: DateTime<Utc>,
    },
}

/// Fold ledger entries (in committed append order) into the authoritative
/// record set, applying status transitions on top of the original records.
///
/// Records come back sorted by `created_at` ascending, id as tiebreak.
pub fn fold_ledger_entries<'a>(
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
) -> Vec<BackupRecord> {
    let mut by_id: BTreeMap<BackupId, BackupRecord> = BTreeMap::new();

    for entry in entries {
        match entry {
            LedgerEntry::Backup(record) => {
                by_id.insert(record.backup_id.clone(), record.clone());
            }
            LedgerEntry::StatusChange {
                backup_id, status, ..
            } => {
                if let Some(record) = by_id.get_mut(backup_id) {
                    record.status = *status;
                } else {
                    // A transition for an unknown record can only mean entries
                    // were read out of append order; surface loudly in logs.
                    tracing::warn!(backup_id = %backup_id, "status change for unknown backup record");
                }
            }
        }
    }

    let mut records: Vec<BackupRecord> = by_id.into_values().collect();
    records.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.backup_id.cmp(&b.backup_id))
    });
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stats() -> SnapshotStats {
        SnapshotStats {
            document_counts: BTreeMap::from([("users".to_string(), 3)]),
            uncompressed_bytes: 300,
            compressed_bytes: 120,
            duration_ms: 5,
            compression_ratio: 0.4,
            checksum: "deadbeef".to_string(),
        }
    }

    fn record(id: &str, kind: BackupKind, ts: DateTime<Utc>) -> BackupRecord {
        BackupRecord {
            backup_id: BackupId::from(id),
            kind,
            content_id: ContentId(format!("cid-{id}")),
            status: BackupStatus::Active,
            parent_backup_id: None,
            stats: stats(),
            label: None,
            created_at: ts,
        }
    }

    #[test]
    fn test_backup_id_format() {
        let at = Utc.with_ymd_and_hms(2025, 12, 4, 13, 3, 30).unwrap();
        let id = BackupId::generate(BackupKind::Full, at);
        assert_eq!(id.as_str(), "FULL_20251204_130330");

        let id = BackupId::generate(BackupKind::Incremental, at);
        assert_eq!(id.as_str(), "INCR_20251204_130330");
    }

    #[test]
    fn test_backup_id_sortable_by_time() {
        let early = Utc.with_ymd_and_hms(2025, 12, 4, 13, 3, 30).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 12, 4, 13, 3, 31).unwrap();
        let a = BackupId::generate(BackupKind::Full, early);
        let b = BackupId::generate(BackupKind::Full, late);
        assert!(a < b);
    }

    #[test]
    fn test_fold_applies_status_changes_in_order() {
        let t0 = Utc.with_ymd_and_hms(2025, 12, 4, 13, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2025, 12, 4, 14, 0, 0).unwrap();

        let entries = vec![
            LedgerEntry::Backup(record("FULL_20251204_130000", BackupKind::Full, t0)),
            LedgerEntry::Backup(record("FULL_20251204_140000", BackupKind::Full, t1)),
            LedgerEntry::StatusChange {
                backup_id: BackupId::from("FULL_20251204_130000"),
                status: BackupStatus::Superseded,
                changed_at: t1,
            },
        ];

        let records = fold_ledger_entries(&entries);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, BackupStatus::Superseded);
        assert_eq!(records[1].status, BackupStatus::Active);
        // Sorted by created_at ascending
        assert_eq!(records[0].backup_id.as_str(), "FULL_20251204_130000");
    }

    #[test]
    fn test_record_serialization_uses_canonical_field_names() {
        let t0 = Utc.with_ymd_and_hms(2025, 12, 4, 13, 0, 0).unwrap();
        let json =
            serde_json::to_value(record("FULL_20251204_130000", BackupKind::Full, t0)).unwrap();
        assert!(json.get("content_id").is_some());
        assert!(json.get("ipfsCid").is_none());
        assert!(json.get("cid").is_none());
        assert_eq!(json["kind"], "full");
        assert_eq!(json["status"], "active");
    }
}

//! End-to-end backup and restore lifecycle tests over the in-memory
//! collaborators.

use std::sync::Arc;

use ballast::prelude::*;
use ballast::{LedgerEntry, LocalIndex};
use chrono::{Duration, Utc};
use tempfile::TempDir;

fn doc(id: &str, offset_minutes: i64, value: &str) -> Document {
    Document::new(
        id,
        Utc::now() + Duration::minutes(offset_minutes),
        serde_json::json!({ "value": value }),
    )
}

struct Fixture {
    system: Ballast,
    primary: Arc<MemoryPrimaryStore>,
    content: Arc<MemoryContentStore>,
    ledger: Arc<MemoryLedger>,
    dir: TempDir,
}

fn fixture() -> Fixture {
    let primary = Arc::new(MemoryPrimaryStore::new());
    let content = Arc::new(MemoryContentStore::new());
    let ledger = Arc::new(MemoryLedger::new());
    let dir = tempfile::tempdir().unwrap();

    let config = BackupConfig::new(vec![
        CollectionSpec::new("users").safe_mode_eligible(),
        CollectionSpec::new("products"),
        CollectionSpec::new("orders"),
    ]);

    let system = Ballast::new(
        primary.clone(),
        content.clone(),
        ledger.clone(),
        config,
        SafeModeConfig::default(),
        dir.path(),
    );

    Fixture {
        system,
        primary,
        content,
        ledger,
        dir,
    }
}

#[tokio::test]
async fn test_full_backup_round_trip() {
    let fx = fixture();
    fx.primary.seed(
        "users",
        vec![doc("u1", 0, "a"), doc("u2", 0, "b"), doc("u3", 0, "c")],
    );
    fx.primary.seed("products", vec![doc("p1", 0, "x")]);
    fx.primary.seed("orders", vec![doc("o1", 0, "y"), doc("o2", 0, "z")]);

    let record = fx
        .system
        .backup()
        .create_full_backup(Some("nightly".to_string()))
        .await
        .unwrap();
    assert_eq!(record.kind, BackupKind::Full);
    assert_eq!(record.status, BackupStatus::Active);
    assert_eq!(record.stats.total_documents(), 6);
    assert!(record.backup_id.as_str().starts_with("FULL_"));

    // Wipe the primary store entirely
    for collection in ["users", "products", "orders"] {
        fx.primary.delete_all(collection).await.unwrap();
    }
    assert_eq!(fx.primary.count_documents("users").await.unwrap(), 0);

    let result = fx
        .system
        .restore()
        .restore_from_backup(BackupSelector::Latest, RestoreOptions::default())
        .await
        .unwrap();

    assert_eq!(result.backup_id, record.backup_id);
    assert_eq!(result.restored_counts["users"], 3);
    assert_eq!(result.restored_counts["products"], 1);
    assert_eq!(result.restored_counts["orders"], 2);
    assert_eq!(fx.primary.count_documents("users").await.unwrap(), 3);
    assert_eq!(fx.primary.count_documents("orders").await.unwrap(), 2);
}

#[tokio::test]
async fn test_empty_incremental_is_skipped_with_no_side_effects() {
    let fx = fixture();
    fx.primary.seed("users", vec![doc("u1", 0, "a")]);

    fx.system.backup().create_full_backup(None).await.unwrap();
    let blobs_before = fx.content.blob_count();
    let entries_before = fx.ledger.entry_count();

    // Nothing modified since the watermark
    let outcome = fx
        .system
        .backup()
        .create_incremental_backup()
        .await
        .unwrap();

    assert!(matches!(outcome, BackupOutcome::Skipped));
    assert_eq!(fx.content.blob_count(), blobs_before);
    assert_eq!(fx.ledger.entry_count(), entries_before);
}

#[tokio::test]
async fn test_list_rebuilds_identically_from_ledger_after_cache_delete() {
    let fx = fixture();
    fx.primary.seed("users", vec![doc("u1", 0, "a")]);
    fx.system.backup().create_full_backup(None).await.unwrap();

    fx.primary
        .upsert_by_id("users", doc("u2", 60, "b"))
        .await
        .unwrap();
    fx.system
        .backup()
        .create_incremental_backup()
        .await
        .unwrap();

    let before = fx.system.backup().list_backups().await.unwrap();
    assert_eq!(before.len(), 2);

    // Destroy the local mirror; the ledger alone must reconstruct it
    let index = LocalIndex::new(fx.dir.path());
    assert!(index.exists());
    index.delete().unwrap();

    let after = fx.system.backup().list_backups().await.unwrap();
    assert_eq!(before, after);
    assert!(index.exists());
}

#[tokio::test]
async fn test_chain_replay_applies_in_creation_order() {
    let fx = fixture();
    fx.primary.seed("users", vec![doc("u1", 0, "original")]);
    fx.system.backup().create_full_backup(None).await.unwrap();

    // First incremental updates u1
    fx.primary
        .upsert_by_id("users", doc("u1", 60, "first-update"))
        .await
        .unwrap();
    let outcome = fx
        .system
        .backup()
        .create_incremental_backup()
        .await
        .unwrap();
    let incr1 = match outcome {
        BackupOutcome::Created(r) => r,
        BackupOutcome::Skipped => panic!("expected an incremental backup"),
    };
    assert_eq!(incr1.kind, BackupKind::Incremental);

    // Second incremental updates u1 again
    fx.primary
        .upsert_by_id("users", doc("u1", 120, "second-update"))
        .await
        .unwrap();
    let outcome = fx
        .system
        .backup()
        .create_incremental_backup()
        .await
        .unwrap();
    let incr2 = match outcome {
        BackupOutcome::Created(r) => r,
        BackupOutcome::Skipped => panic!("expected an incremental backup"),
    };
    assert_eq!(incr2.parent_backup_id.as_ref(), Some(&incr1.backup_id));

    // Wipe and replay the whole chain
    fx.primary.delete_all("users").await.unwrap();
    let result = fx
        .system
        .restore()
        .restore_from_backup(BackupSelector::Latest, RestoreOptions::default())
        .await
        .unwrap();

    assert_eq!(result.chain.len(), 3);
    assert_eq!(result.chain[2], incr2.backup_id);

    let restored = fx
        .primary
        .find_by_id("users", "u1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(restored.body["value"], "second-update");
}

#[tokio::test]
async fn test_ledger_append_failure_leaves_no_record() {
    let fx = fixture();
    fx.primary.seed("users", vec![doc("u1", 0, "a")]);

    fx.ledger.set_unavailable(true);
    let err = fx
        .system
        .backup()
        .create_full_backup(None)
        .await
        .unwrap_err();

    // The blob is safely stored but not anchored, and the error says so
    match err {
        BallastError::LedgerAppend { content_id, .. } => assert!(!content_id.is_empty()),
        other => panic!("expected LedgerAppend, got {other}"),
    }
    assert_eq!(fx.content.blob_count(), 1); // orphaned blob, harmless
    assert_eq!(fx.ledger.entry_count(), 0);

    fx.ledger.set_unavailable(false);
    assert!(fx.system.backup().list_backups().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_checksum_mismatch_refuses_restore() {
    let fx = fixture();
    fx.primary.seed("users", vec![doc("u1", 0, "a")]);
    let record = fx.system.backup().create_full_backup(None).await.unwrap();

    // Forge a newer record pointing at the same blob with a bad checksum
    let mut forged = record.clone();
    forged.backup_id = ballast::BackupId::from("FULL_20991231_235959");
    forged.created_at = record.created_at + Duration::days(1);
    forged.stats.checksum = "0000".to_string();
    fx.ledger
        .append(forged.backup_id.as_str(), LedgerEntry::Backup(forged.clone()))
        .await
        .unwrap();

    let err = fx
        .system
        .restore()
        .restore_from_backup(BackupSelector::Latest, RestoreOptions::default())
        .await
        .unwrap_err();

    match err {
        BallastError::ChainElementFailed {
            backup_id, source, ..
        } => {
            assert_eq!(backup_id, forged.backup_id.to_string());
            assert!(matches!(*source, BallastError::Integrity { .. }));
        }
        other => panic!("expected ChainElementFailed, got {other}"),
    }

    // Restoring the intact record by id still works
    let result = fx
        .system
        .restore()
        .restore_from_backup(
            BackupSelector::Id(record.backup_id.clone()),
            RestoreOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(result.restored_counts["users"], 1);
}

#[tokio::test]
async fn test_blocked_restore_leaves_every_collection_untouched() {
    let fx = fixture();
    fx.primary.seed("orders", vec![doc("o1", 0, "old-order")]);
    fx.primary.seed("users", vec![doc("u1", 0, "a")]);
    fx.system.backup().create_full_backup(None).await.unwrap();

    // The primary moves on: orders gets newer data, users outgrows the backup
    fx.primary
        .upsert_by_id("orders", doc("o1", 60, "newer-order"))
        .await
        .unwrap();
    fx.primary
        .seed("users", vec![doc("u2", 0, "b"), doc("u3", 0, "c")]);

    let err = fx
        .system
        .restore()
        .restore_from_backup(BackupSelector::Latest, RestoreOptions::default())
        .await
        .unwrap_err();
    match err {
        BallastError::ChainElementFailed { source, .. } => match *source {
            BallastError::RestoreBlocked { ref collection, .. } => {
                assert_eq!(collection, "users")
            }
            ref other => panic!("expected RestoreBlocked, got {other}"),
        },
        other => panic!("expected ChainElementFailed, got {other}"),
    }

    // The guard tripping on one collection must leave every other collection
    // exactly as it was; a blocked restore is a complete no-op
    let order = fx
        .primary
        .find_by_id("orders", "o1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.body["value"], "newer-order");
    assert_eq!(fx.primary.count_documents("orders").await.unwrap(), 1);
    assert_eq!(fx.primary.count_documents("users").await.unwrap(), 3);
}

#[tokio::test]
async fn test_overwrite_guard_blocks_stale_restore_unless_forced() {
    let fx = fixture();
    fx.primary.seed("users", vec![doc("u1", 0, "a")]);
    fx.system.backup().create_full_backup(None).await.unwrap();

    // The primary now holds more documents than the backup would restore
    fx.primary
        .seed("users", vec![doc("u2", 0, "b"), doc("u3", 0, "c")]);

    let err = fx
        .system
        .restore()
        .restore_from_backup(BackupSelector::Latest, RestoreOptions::default())
        .await
        .unwrap_err();
    match err {
        BallastError::ChainElementFailed { source, .. } => {
            assert!(matches!(*source, BallastError::RestoreBlocked { .. }));
        }
        other => panic!("expected ChainElementFailed, got {other}"),
    }
    assert_eq!(fx.primary.count_documents("users").await.unwrap(), 3);

    let result = fx
        .system
        .restore()
        .restore_from_backup(
            BackupSelector::Latest,
            RestoreOptions {
                guard_overwrite: true,
                force: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(result.restored_counts["users"], 1);
    assert_eq!(fx.primary.count_documents("users").await.unwrap(), 1);
}

#[tokio::test]
async fn test_retention_supersedes_old_chains_without_touching_originals() {
    let primary = Arc::new(MemoryPrimaryStore::new());
    let content = Arc::new(MemoryContentStore::new());
    let ledger = Arc::new(MemoryLedger::new());
    let dir = tempfile::tempdir().unwrap();

    let config =
        BackupConfig::new(vec![CollectionSpec::new("users")]).with_retention(1);
    let system = Ballast::new(
        primary.clone(),
        content,
        ledger.clone(),
        config,
        SafeModeConfig::default(),
        dir.path(),
    );

    primary.seed("users", vec![doc("u1", 0, "a")]);
    let old_full = system.backup().create_full_backup(None).await.unwrap();

    primary
        .upsert_by_id("users", doc("u1", 60, "b"))
        .await
        .unwrap();
    let old_incr = match system.backup().create_incremental_backup().await.unwrap() {
        BackupOutcome::Created(r) => r,
        BackupOutcome::Skipped => panic!("expected an incremental backup"),
    };

    let new_full = system.backup().create_full_backup(None).await.unwrap();
    let entries_before_cleanup = ledger.entry_count();

    let superseded = system.backup().cleanup_old_backups().await.unwrap();
    assert!(superseded.contains(&old_full.backup_id));
    assert!(superseded.contains(&old_incr.backup_id));
    assert!(!superseded.contains(&new_full.backup_id));

    // Pruning only appended status transitions; nothing was rewritten
    assert_eq!(
        ledger.entry_count(),
        entries_before_cleanup + superseded.len()
    );

    let records = system.backup().list_backups().await.unwrap();
    let statuses: Vec<(String, BackupStatus)> = records
        .iter()
        .map(|r| (r.backup_id.to_string(), r.status))
        .collect();
    assert!(statuses.contains(&(old_full.backup_id.to_string(), BackupStatus::Superseded)));
    assert!(statuses.contains(&(new_full.backup_id.to_string(), BackupStatus::Active)));

    // Latest resolution ignores superseded records
    let result = system
        .restore()
        .restore_from_backup(BackupSelector::Latest, RestoreOptions::default())
        .await
        .unwrap();
    assert_eq!(result.backup_id, new_full.backup_id);
}

#[tokio::test]
async fn test_mark_backup_failed_excludes_record_from_latest() {
    let fx = fixture();
    fx.primary.seed("users", vec![doc("u1", 0, "a")]);
    let first = fx.system.backup().create_full_backup(None).await.unwrap();
    let second = fx.system.backup().create_full_backup(None).await.unwrap();

    let failed = fx
        .system
        .backup()
        .mark_backup_failed(&second.backup_id)
        .await
        .unwrap();
    assert_eq!(failed.status, BackupStatus::Failed);

    let result = fx
        .system
        .restore()
        .restore_from_backup(BackupSelector::Latest, RestoreOptions::default())
        .await
        .unwrap();
    assert_eq!(result.backup_id, first.backup_id);
}

#[tokio::test]
async fn test_incremental_without_full_is_rejected() {
    let fx = fixture();
    fx.primary.seed("users", vec![doc("u1", 0, "a")]);

    let err = fx
        .system
        .backup()
        .create_incremental_backup()
        .await
        .unwrap_err();
    assert!(matches!(err, BallastError::NotFound(_)));
}

#[tokio::test]
async fn test_source_outage_fails_backup_atomically() {
    let fx = fixture();
    fx.primary.seed("users", vec![doc("u1", 0, "a")]);
    fx.primary.set_unavailable(true);

    let err = fx
        .system
        .backup()
        .create_full_backup(None)
        .await
        .unwrap_err();
    assert!(matches!(err, BallastError::SourceUnavailable(_)));

    // Nothing was uploaded, nothing was anchored
    assert_eq!(fx.content.blob_count(), 0);
    assert_eq!(fx.ledger.entry_count(), 0);
}

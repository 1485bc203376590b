//! Mutual-exclusion tests: backup and restore share one operation lock and
//! reject concurrent attempts immediately instead of queueing.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use ballast::prelude::*;
use ballast::{operation_lock, LocalIndex};
use chrono::Utc;
use tokio::time::timeout;

fn doc(id: &str, value: &str) -> Document {
    Document::new(id, Utc::now(), serde_json::json!({ "value": value }))
}

struct Fixture {
    backup: BackupCoordinator,
    restore: RestoreCoordinator,
    lock: ballast::OperationLock,
    primary: Arc<MemoryPrimaryStore>,
    _dir: tempfile::TempDir,
}

fn fixture() -> Fixture {
    let primary = Arc::new(MemoryPrimaryStore::new());
    let content: Arc<dyn ContentStore> = Arc::new(MemoryContentStore::new());
    let ledger: Arc<dyn Ledger> = Arc::new(MemoryLedger::new());
    let dir = tempfile::tempdir().unwrap();
    let lock = operation_lock();

    let config = BackupConfig::new(vec![CollectionSpec::new("users")]);
    let backup = BackupCoordinator::new(
        primary.clone(),
        content.clone(),
        ledger.clone(),
        config,
        dir.path(),
        lock.clone(),
    );
    let restore = RestoreCoordinator::new(primary.clone(), content, ledger, lock.clone());

    Fixture {
        backup,
        restore,
        lock,
        primary,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_backup_rejected_while_operation_in_flight() {
    let fx = fixture();
    fx.primary.seed("users", vec![doc("u1", "a")]);

    let _in_flight = fx.lock.lock().await;

    // Rejection is immediate, never queued behind the running operation
    let err = timeout(StdDuration::from_secs(1), fx.backup.create_full_backup(None))
        .await
        .expect("rejection must not block")
        .unwrap_err();
    assert!(matches!(err, BallastError::ConcurrencyRejected));

    let err = timeout(
        StdDuration::from_secs(1),
        fx.backup.create_incremental_backup(),
    )
    .await
    .expect("rejection must not block")
    .unwrap_err();
    assert!(matches!(err, BallastError::ConcurrencyRejected));
}

#[tokio::test]
async fn test_restore_rejected_while_operation_in_flight() {
    let fx = fixture();
    fx.primary.seed("users", vec![doc("u1", "a")]);
    fx.backup.create_full_backup(None).await.unwrap();

    let _in_flight = fx.lock.lock().await;

    let err = timeout(
        StdDuration::from_secs(1),
        fx.restore
            .restore_from_backup(BackupSelector::Latest, RestoreOptions::default()),
    )
    .await
    .expect("rejection must not block")
    .unwrap_err();
    assert!(matches!(err, BallastError::ConcurrencyRejected));
}

#[tokio::test]
async fn test_operations_proceed_after_lock_released() {
    let fx = fixture();
    fx.primary.seed("users", vec![doc("u1", "a")]);

    {
        let _in_flight = fx.lock.lock().await;
        assert!(matches!(
            fx.backup.create_full_backup(None).await.unwrap_err(),
            BallastError::ConcurrencyRejected
        ));
    }

    // A rejected attempt leaves no partial state behind
    let index = LocalIndex::new(fx._dir.path());
    assert!(index.load().unwrap().records.is_empty());

    let record = fx.backup.create_full_backup(None).await.unwrap();
    assert_eq!(record.status, BackupStatus::Active);
    assert_eq!(index.load().unwrap().records.len(), 1);
}

#[tokio::test]
async fn test_backup_ids_stay_unique_within_one_second() {
    let fx = fixture();
    fx.primary.seed("users", vec![doc("u1", "a")]);

    let a = fx.backup.create_full_backup(None).await.unwrap();
    let b = fx.backup.create_full_backup(None).await.unwrap();
    let c = fx.backup.create_full_backup(None).await.unwrap();

    assert_ne!(a.backup_id, b.backup_id);
    assert_ne!(b.backup_id, c.backup_id);
    assert!(a.created_at < b.created_at && b.created_at < c.created_at);
}

//! Backup command implementations

use anyhow::{Context, Result};
use ballast::prelude::*;
use ballast::BackupId;

pub async fn full(system: &Ballast, label: Option<String>) -> Result<()> {
    tracing::info!("Starting full backup");

    let record = system
        .backup()
        .create_full_backup(label)
        .await
        .context("Full backup failed")?;

    println!("\nFull Backup Created");
    println!("{}", "=".repeat(60));
    print_record(&record);
    Ok(())
}

pub async fn incremental(system: &Ballast) -> Result<()> {
    tracing::info!("Starting incremental backup");

    let outcome = system
        .backup()
        .create_incremental_backup()
        .await
        .context("Incremental backup failed")?;

    match outcome {
        BackupOutcome::Created(record) => {
            println!("\nIncremental Backup Created");
            println!("{}", "=".repeat(60));
            print_record(&record);
        }
        BackupOutcome::Skipped => {
            println!("No changes since the last backup; nothing uploaded.");
        }
    }
    Ok(())
}

pub async fn mark_failed(system: &Ballast, backup_id: &str) -> Result<()> {
    let record = system
        .backup()
        .mark_backup_failed(&BackupId::from(backup_id))
        .await
        .context("Failed to mark backup")?;

    println!("Marked {} as failed", record.backup_id);
    Ok(())
}

pub async fn cleanup(system: &Ballast) -> Result<()> {
    let superseded = system
        .backup()
        .cleanup_old_backups()
        .await
        .context("Cleanup failed")?;

    if superseded.is_empty() {
        println!("Nothing to prune; all chains are within the retention window.");
    } else {
        println!("Superseded {} backup(s):", superseded.len());
        for id in superseded {
            println!("  {}", id);
        }
    }
    Ok(())
}

fn print_record(record: &BackupRecord) {
    println!("Backup ID: {}", record.backup_id);
    println!("Content ID: {}", record.content_id);
    if let Some(parent) = &record.parent_backup_id {
        println!("Parent: {}", parent);
    }
    if let Some(label) = &record.label {
        println!("Label: {}", label);
    }
    println!("Documents: {}", record.stats.total_documents());
    println!(
        "Compressed: {} bytes ({:.1}% of raw)",
        record.stats.compressed_bytes,
        record.stats.compression_ratio * 100.0
    );
    println!("Checksum: {}", record.stats.checksum);
    println!("Duration: {} ms", record.stats.duration_ms);
}

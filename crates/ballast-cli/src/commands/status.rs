//! Status command implementation

use anyhow::{Context, Result};
use ballast::prelude::*;

pub async fn execute(system: &Ballast) -> Result<()> {
    println!("\nSubsystem Status");
    println!("{}", "=".repeat(60));

    let state = system.gate().probe_and_update().await;
    println!(
        "Primary store: {}",
        match state {
            GateState::Normal => "reachable (normal mode)",
            GateState::Degraded => "UNREACHABLE (safe mode, writes rejected)",
        }
    );
    if let Some(backup_id) = system.gate().cached_backup_id() {
        println!("Safe-mode cache: {}", backup_id);
    }

    let records = system
        .backup()
        .list_backups()
        .await
        .context("Failed to list backups")?;

    let active = records
        .iter()
        .filter(|r| r.status == BackupStatus::Active)
        .count();
    let failed = records
        .iter()
        .filter(|r| r.status == BackupStatus::Failed)
        .count();
    println!("\nLedger records: {}", records.len());
    println!("  active: {}", active);
    println!("  failed: {}", failed);
    println!("  superseded: {}", records.len() - active - failed);

    if let Some(latest) = records
        .iter()
        .filter(|r| r.status == BackupStatus::Active)
        .max_by(|a, b| a.created_at.cmp(&b.created_at))
    {
        println!(
            "\nLatest active backup: {} ({} docs, {})",
            latest.backup_id,
            latest.stats.total_documents(),
            latest.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        );
    }
    Ok(())
}

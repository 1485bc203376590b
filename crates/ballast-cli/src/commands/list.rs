//! List command implementation

use anyhow::{Context, Result};
use ballast::prelude::*;

pub async fn execute(system: &Ballast) -> Result<()> {
    let records = system
        .backup()
        .list_backups()
        .await
        .context("Failed to list backups")?;

    if records.is_empty() {
        println!("No backups recorded.");
        return Ok(());
    }

    println!("\nBackups ({})", records.len());
    println!("{}", "=".repeat(60));
    for record in &records {
        let status = match record.status {
            BackupStatus::Active => "active",
            BackupStatus::Failed => "FAILED",
            BackupStatus::Superseded => "superseded",
        };
        println!(
            "{}  {:>10}  {} docs  {}",
            record.backup_id,
            status,
            record.stats.total_documents(),
            record.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
        );
        if let Some(label) = &record.label {
            println!("    label: {}", label);
        }
    }
    Ok(())
}

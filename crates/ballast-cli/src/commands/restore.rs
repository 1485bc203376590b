//! Restore command implementation

use anyhow::{Context, Result};
use ballast::prelude::*;

pub async fn execute(system: &Ballast, selector: &str, force: bool) -> Result<()> {
    let selector = BackupSelector::parse(selector);
    let options = RestoreOptions {
        guard_overwrite: true,
        force,
    };

    tracing::info!(?selector, force, "Starting restore");

    let result = system
        .restore()
        .restore_from_backup(selector, options)
        .await
        .context("Restore failed")?;

    println!("\nRestore Complete");
    println!("{}", "=".repeat(60));
    println!("Backup ID: {}", result.backup_id);
    println!("Chain applied ({} element(s)):", result.chain.len());
    for id in &result.chain {
        println!("  {}", id);
    }
    println!("Restored documents:");
    for (collection, count) in &result.restored_counts {
        println!("  {}: {}", collection, count);
    }
    println!("Duration: {} ms", result.duration_ms);
    Ok(())
}

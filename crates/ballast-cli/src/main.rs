//! Ballast CLI - Command-line interface for backup and restore operations

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "ballast")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Directory holding the local backup index
    #[arg(short, long, default_value = "./data")]
    index_dir: PathBuf,

    /// Collections covered by backups (repeatable)
    #[arg(short, long = "collection", default_values_t = vec!["users".to_string()])]
    collections: Vec<String>,

    /// Collections servable from cache while the primary store is down
    /// (repeatable, must also appear in --collection)
    #[arg(long = "safe-mode-collection")]
    safe_mode_collections: Vec<String>,

    /// Full-backup chains to keep when pruning
    #[arg(long, default_value_t = 7)]
    retention: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backup management commands
    #[command(subcommand)]
    Backup(BackupCommands),

    /// List all backups recorded on the ledger
    List,

    /// Restore the primary store from a backup
    Restore {
        /// Backup id to restore, or "latest"
        #[arg(default_value = "latest")]
        selector: String,

        /// Proceed even when the target collections hold more documents
        /// than the backup would restore
        #[arg(short, long)]
        force: bool,
    },

    /// Subsystem health and backup status
    Status,
}

#[derive(Subcommand)]
enum BackupCommands {
    /// Create a full backup of all configured collections
    Full {
        /// Free-form label recorded alongside the backup
        #[arg(short, long)]
        label: Option<String>,
    },

    /// Create an incremental backup of changes since the watermark
    Incremental,

    /// Mark a backup record as failed so restores skip it
    MarkFailed {
        /// Backup id to mark
        backup_id: String,
    },

    /// Supersede full-backup chains beyond the retention window
    Cleanup,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let system = commands::build_system(
        &cli.index_dir,
        &cli.collections,
        &cli.safe_mode_collections,
        cli.retention,
    )?;

    // Execute command
    match cli.command {
        Commands::Backup(backup_cmd) => match backup_cmd {
            BackupCommands::Full { label } => {
                commands::backup::full(&system, label).await?;
            }
            BackupCommands::Incremental => {
                commands::backup::incremental(&system).await?;
            }
            BackupCommands::MarkFailed { backup_id } => {
                commands::backup::mark_failed(&system, &backup_id).await?;
            }
            BackupCommands::Cleanup => {
                commands::backup::cleanup(&system).await?;
            }
        },
        Commands::List => {
            commands::list::execute(&system).await?;
        }
        Commands::Restore { selector, force } => {
            commands::restore::execute(&system, &selector, force).await?;
        }
        Commands::Status => {
            commands::status::execute(&system).await?;
        }
    }

    Ok(())
}

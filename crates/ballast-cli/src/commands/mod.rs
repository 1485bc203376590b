//! Command implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ballast::prelude::*;
use ballast::{HttpContentStore, HttpLedger, HttpPrimaryStore};

pub mod backup;
pub mod list;
pub mod restore;
pub mod status;

/// Wire the subsystem against the HTTP collaborators named by
/// `PRIMARY_API_URL`, `CONTENT_GATEWAY_URL`, and `LEDGER_GATEWAY_URL`.
pub fn build_system(
    index_dir: &Path,
    collections: &[String],
    safe_mode_collections: &[String],
    retention: usize,
) -> Result<Ballast> {
    let primary =
        Arc::new(HttpPrimaryStore::from_env().context("Failed to configure primary store")?);
    let content =
        Arc::new(HttpContentStore::from_env().context("Failed to configure content store")?);
    let ledger = Arc::new(HttpLedger::from_env().context("Failed to configure ledger")?);

    let specs: Vec<CollectionSpec> = collections
        .iter()
        .map(|name| {
            let spec = CollectionSpec::new(name);
            if safe_mode_collections.iter().any(|c| c == name) {
                spec.safe_mode_eligible()
            } else {
                spec
            }
        })
        .collect();

    let config = BackupConfig::new(specs).with_retention(retention);

    Ok(Ballast::new(
        primary,
        content,
        ledger,
        config,
        SafeModeConfig::default(),
        index_dir,
    ))
}

//! Local backup index
//!
//! A `.ballast_index` JSON file mirroring the ledger's record set plus the
//! incremental watermark. The ledger is authoritative; this file is a
//! disposable cache; deleting it loses nothing, since `list_backups`
//! rebuilds it entirely from ledger contents.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ballast_core::{BackupRecord, BallastError, Result};

pub const INDEX_FILENAME: &str = ".ballast_index";

/// On-disk index contents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexFile {
    /// Mirror of the folded ledger record set
    pub records: Vec<BackupRecord>,

    /// Incremental-backup watermark: documents modified strictly after this
    /// instant are included in the next incremental. Advanced only on
    /// successful backup completion.
    pub watermark: Option<DateTime<Utc>>,
}

/// Manages reading and writing of the local index file.
pub struct LocalIndex {
    path: PathBuf,
}

impl LocalIndex {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            path: base_dir.as_ref().join(INDEX_FILENAME),
        }
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the index; an absent file is an empty index, never an error.
    pub fn load(&self) -> Result<IndexFile> {
        if !self.path.exists() {
            return Ok(IndexFile::default());
        }
        let json = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&json).map_err(|e| BallastError::Serialization(e.to_string()))
    }

    /// Write the index atomically (temp file + rename) so a crash mid-write
    /// never leaves a truncated index.
    pub fn save(&self, index: &IndexFile) -> Result<()> {
        let json = serde_json::to_string_pretty(index)
            .map_err(|e| BallastError::Serialization(e.to_string()))?;

        let tmp_path = self.path.with_extension("tmp");
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    pub fn delete(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

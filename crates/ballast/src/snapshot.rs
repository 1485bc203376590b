//! Snapshot builder
//!
//! Serializes the configured collections into a single streamable blob: a
//! gzip-compressed NDJSON sequence of collection-tagged records. The
//! integrity checksum covers the compressed bytes that are actually
//! uploaded, so restore verifies exactly what the content store holds.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};

use ballast_core::{
    BallastError, CollectionSpec, PrimaryStore, Result, SnapshotStats, TaggedRecord,
};

/// A built snapshot: the compressed blob plus its integrity metadata.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Compressed bytes, exactly as they will be uploaded
    pub bytes: Vec<u8>,

    pub stats: SnapshotStats,
}

/// Outcome of a snapshot build.
///
/// `NoChanges` is the designed skip condition for an incremental pass that
/// finds zero qualifying documents; callers must treat it as "skip", never
/// as a valid empty backup.
#[derive(Debug)]
pub enum SnapshotBuild {
    Snapshot(Snapshot),
    NoChanges,
}

/// Hex-encoded SHA-256 of a byte slice.
pub fn checksum_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Reads the primary store and produces snapshot blobs.
pub struct SnapshotBuilder {
    primary: Arc<dyn PrimaryStore>,
    collections: Vec<CollectionSpec>,
    compression_level: u32,
}

impl SnapshotBuilder {
    pub fn new(
        primary: Arc<dyn PrimaryStore>,
        collections: Vec<CollectionSpec>,
        compression_level: u32,
    ) -> Self {
        Self {
            primary,
            collections,
            compression_level: compression_level.min(9),
        }
    }

    /// Snapshot every document in every configured collection.
    pub async fn build_full(&self) -> Result<Snapshot> {
        match self.build(None).await? {
            SnapshotBuild::Snapshot(snapshot) => Ok(snapshot),
            // A full snapshot of an empty store is a legitimate (empty) blob,
            // so build() never reports NoChanges for it.
            SnapshotBuild::NoChanges => unreachable!("full builds always produce a blob"),
        }
    }

    /// Snapshot only documents modified strictly after `since`.
    pub async fn build_incremental(&self, since: DateTime<Utc>) -> Result<SnapshotBuild> {
        self.build(Some(since)).await
    }

    async fn build(&self, since: Option<DateTime<Utc>>) -> Result<SnapshotBuild> {
        let started = Instant::now();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(self.compression_level));
        let mut document_counts: BTreeMap<String, u64> = BTreeMap::new();
        let mut uncompressed_bytes = 0u64;
        let mut total_documents = 0u64;

        for spec in &self.collections {
            // Any mid-read failure aborts the whole build; the partially
            // written encoder buffer is simply dropped.
            let docs = match since {
                Some(ts) => self.primary.find_modified_since(&spec.name, ts).await?,
                None => self.primary.find_all(&spec.name).await?,
            };

            let count = docs.len() as u64;
            for document in docs {
                let record = TaggedRecord {
                    collection: spec.name.clone(),
                    document,
                };
                let line = serde_json::to_vec(&record)
                    .map_err(|e| BallastError::Serialization(e.to_string()))?;
                encoder.write_all(&line)?;
                encoder.write_all(b"\n")?;
                uncompressed_bytes += line.len() as u64 + 1;
            }

            document_counts.insert(spec.name.clone(), count);
            total_documents += count;
            tracing::debug!(collection = %spec.name, documents = count, "collection serialized");
        }

        if since.is_some() && total_documents == 0 {
            tracing::info!("no documents modified since watermark, skipping snapshot");
            return Ok(SnapshotBuild::NoChanges);
        }

        let bytes = encoder.finish()?;
        let compressed_bytes = bytes.len() as u64;
        let checksum = checksum_hex(&bytes);
        let compression_ratio = if uncompressed_bytes == 0 {
            1.0
        } else {
            compressed_bytes as f64 / uncompressed_bytes as f64
        };

        let stats = SnapshotStats {
            document_counts,
            uncompressed_bytes,
            compressed_bytes,
            duration_ms: started.elapsed().as_millis() as u64,
            compression_ratio,
            checksum,
        };

        tracing::info!(
            documents = total_documents,
            compressed_bytes,
            uncompressed_bytes,
            "snapshot built"
        );

        Ok(SnapshotBuild::Snapshot(Snapshot { bytes, stats }))
    }
}

/// Decompress and decode a snapshot blob back into its tagged records, in
/// the order they were written.
pub fn decode_snapshot(bytes: &[u8]) -> Result<Vec<TaggedRecord>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut ndjson = String::new();
    decoder
        .read_to_string(&mut ndjson)
        .map_err(|e| BallastError::Serialization(format!("blob decompression failed: {}", e)))?;

    let mut records = Vec::new();
    for line in ndjson.lines() {
        if line.is_empty() {
            continue;
        }
        let record: TaggedRecord = serde_json::from_str(line)
            .map_err(|e| BallastError::Serialization(format!("bad snapshot record: {}", e)))?;
        records.push(record);
    }
    Ok(records)
}

//! Content store implementations
//!
//! `HttpContentStore` talks to a content-addressed object-storage gateway.
//! `MemoryContentStore` addresses blobs by their SHA-256 so content
//! addressing is exact and idempotent in tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use ballast_core::{BallastError, ContentId, ContentStore, GatewayConfig, Result};

/// Client for an HTTP blob gateway.
///
/// - `POST {base}/blobs` with the raw bytes -> `{ "content_id": "<hash>" }`
/// - `GET  {base}/blobs/{content_id}` -> raw bytes
pub struct HttpContentStore {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl HttpContentStore {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BallastError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    /// Build from `CONTENT_GATEWAY_URL`.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("CONTENT_GATEWAY_URL")
            .map_err(|_| BallastError::Config("CONTENT_GATEWAY_URL not set".to_string()))?;
        Self::new(GatewayConfig::new(base_url))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl ContentStore for HttpContentStore {
    async fn put(&self, bytes: &[u8]) -> Result<ContentId> {
        let size = bytes.len();
        tracing::info!(size_bytes = size, "uploading blob to content store");

        let response = self
            .client
            .post(self.url("blobs"))
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| BallastError::Upload(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BallastError::Upload(format!(
                "content store returned status {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BallastError::Upload(format!("invalid gateway response: {}", e)))?;

        let content_id = body["content_id"]
            .as_str()
            .ok_or_else(|| {
                BallastError::Upload("gateway response missing content_id field".to_string())
            })?
            .to_string();

        tracing::info!(content_id = %content_id, size_bytes = size, "blob upload complete");
        Ok(ContentId(content_id))
    }

    async fn get(&self, id: &ContentId) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(self.url(&format!("blobs/{}", id)))
            .send()
            .await
            .map_err(|e| BallastError::ContentStore(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BallastError::ContentStore(format!(
                "content store returned status {} for {}",
                response.status(),
                id
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BallastError::ContentStore(e.to_string()))?
            .to_vec();

        tracing::debug!(content_id = %id, size_bytes = bytes.len(), "blob downloaded");
        Ok(bytes)
    }
}

/// In-memory content store addressing blobs by SHA-256, with a fault switch.
#[derive(Default)]
pub struct MemoryContentStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    unavailable: AtomicBool,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.read().len()
    }

    fn guard(&self, context: &str) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BallastError::ContentStore(format!(
                "{}: gateway unreachable (injected fault)",
                context
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ContentStore for MemoryContentStore {
    async fn put(&self, bytes: &[u8]) -> Result<ContentId> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BallastError::Upload(
                "gateway unreachable (injected fault)".to_string(),
            ));
        }
        let digest = format!("{:x}", Sha256::digest(bytes));
        self.blobs.write().insert(digest.clone(), bytes.to_vec());
        Ok(ContentId(digest))
    }

    async fn get(&self, id: &ContentId) -> Result<Vec<u8>> {
        self.guard("get")?;
        self.blobs
            .read()
            .get(&id.0)
            .cloned()
            .ok_or_else(|| BallastError::NotFound(format!("no blob for content id {}", id)))
    }
}

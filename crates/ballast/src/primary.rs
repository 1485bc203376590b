//! Primary-store implementations
//!
//! `HttpPrimaryStore` speaks to the storefront's CRUD REST API.
//! `MemoryPrimaryStore` is a deterministic in-memory document store with a
//! fault switch, used by tests and the failover suite.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use ballast_core::{BallastError, Document, GatewayConfig, PrimaryStore, Result};

/// Primary-store client over the application's CRUD REST endpoints.
///
/// Expected routes, all JSON:
/// - `GET  {base}/health`
/// - `GET  {base}/collections/{name}/count` -> `{ "count": u64 }`
/// - `GET  {base}/collections/{name}` (optional `?modified_since=<rfc3339>`)
/// - `GET  {base}/collections/{name}/{id}`
/// - `DELETE {base}/collections/{name}` -> `{ "deleted": u64 }`
/// - `POST {base}/collections/{name}/bulk` -> `{ "inserted": u64 }`
/// - `PUT  {base}/collections/{name}/{id}`
/// - `POST {base}/collections/{from}/rename` with `{ "to": name }`
pub struct HttpPrimaryStore {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl HttpPrimaryStore {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BallastError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    /// Build from `PRIMARY_API_URL`.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("PRIMARY_API_URL")
            .map_err(|_| BallastError::Config("PRIMARY_API_URL not set".to_string()))?;
        Self::new(GatewayConfig::new(base_url))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn unavailable(e: reqwest::Error) -> BallastError {
        BallastError::SourceUnavailable(e.to_string())
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        if !response.status().is_success() {
            return Err(BallastError::SourceUnavailable(format!(
                "primary store returned status {}",
                response.status()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl PrimaryStore for HttpPrimaryStore {
    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(self.url("health"))
            .send()
            .await
            .map_err(Self::unavailable)?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn count_documents(&self, collection: &str) -> Result<u64> {
        let response = self
            .client
            .get(self.url(&format!("collections/{}/count", collection)))
            .send()
            .await
            .map_err(Self::unavailable)?;
        let body: serde_json::Value = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(Self::unavailable)?;
        Ok(body["count"].as_u64().unwrap_or(0))
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Document>> {
        let response = self
            .client
            .get(self.url(&format!("collections/{}", collection)))
            .send()
            .await
            .map_err(Self::unavailable)?;
        Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(Self::unavailable)
    }

    async fn find_modified_since(
        &self,
        collection: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Document>> {
        let response = self
            .client
            .get(self.url(&format!("collections/{}", collection)))
            .query(&[("modified_since", since.to_rfc3339())])
            .send()
            .await
            .map_err(Self::unavailable)?;
        Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(Self::unavailable)
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let response = self
            .client
            .get(self.url(&format!("collections/{}/{}", collection, id)))
            .send()
            .await
            .map_err(Self::unavailable)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let doc = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(Self::unavailable)?;
        Ok(Some(doc))
    }

    async fn delete_all(&self, collection: &str) -> Result<u64> {
        let response = self
            .client
            .delete(self.url(&format!("collections/{}", collection)))
            .send()
            .await
            .map_err(Self::unavailable)?;
        let body: serde_json::Value = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(Self::unavailable)?;
        Ok(body["deleted"].as_u64().unwrap_or(0))
    }

    async fn bulk_insert(&self, collection: &str, docs: Vec<Document>) -> Result<u64> {
        let inserted = docs.len() as u64;
        let response = self
            .client
            .post(self.url(&format!("collections/{}/bulk", collection)))
            .json(&docs)
            .send()
            .await
            .map_err(Self::unavailable)?;
        Self::check_status(response).await?;
        Ok(inserted)
    }

    async fn upsert_by_id(&self, collection: &str, doc: Document) -> Result<()> {
        let response = self
            .client
            .put(self.url(&format!("collections/{}/{}", collection, doc.id)))
            .json(&doc)
            .send()
            .await
            .map_err(Self::unavailable)?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn rename_collection(&self, from: &str, to: &str) -> Result<()> {
        let response = self
            .client
            .post(self.url(&format!("collections/{}/rename", from)))
            .json(&serde_json::json!({ "to": to }))
            .send()
            .await
            .map_err(Self::unavailable)?;
        Self::check_status(response).await?;
        Ok(())
    }
}

/// In-memory primary store with a fault switch.
///
/// Flipping `set_unavailable(true)` makes every call (including the health
/// probe) fail with `SourceUnavailable`, which is how the tests drive the
/// safe-mode gate deterministically.
#[derive(Default)]
pub struct MemoryPrimaryStore {
    collections: RwLock<HashMap<String, HashMap<String, Document>>>,
    unavailable: AtomicBool,
}

impl MemoryPrimaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject or clear a connectivity fault.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn guard(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BallastError::SourceUnavailable(
                "connection refused (injected fault)".to_string(),
            ));
        }
        Ok(())
    }

    /// Direct insert for test setup; bypasses the fault switch.
    pub fn seed(&self, collection: &str, docs: Vec<Document>) {
        let mut collections = self.collections.write();
        let entry = collections.entry(collection.to_string()).or_default();
        for doc in docs {
            entry.insert(doc.id.clone(), doc);
        }
    }
}

#[async_trait]
impl PrimaryStore for MemoryPrimaryStore {
    async fn health_check(&self) -> Result<()> {
        self.guard()
    }

    async fn count_documents(&self, collection: &str) -> Result<u64> {
        self.guard()?;
        Ok(self
            .collections
            .read()
            .get(collection)
            .map(|c| c.len() as u64)
            .unwrap_or(0))
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Document>> {
        self.guard()?;
        let mut docs: Vec<Document> = self
            .collections
            .read()
            .get(collection)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(docs)
    }

    async fn find_modified_since(
        &self,
        collection: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<Document>> {
        self.guard()?;
        let mut docs: Vec<Document> = self
            .collections
            .read()
            .get(collection)
            .map(|c| {
                c.values()
                    .filter(|d| d.modified_at > since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        docs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(docs)
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.guard()?;
        Ok(self
            .collections
            .read()
            .get(collection)
            .and_then(|c| c.get(id).cloned()))
    }

    async fn delete_all(&self, collection: &str) -> Result<u64> {
        self.guard()?;
        let mut collections = self.collections.write();
        let deleted = collections
            .get_mut(collection)
            .map(|c| {
                let n = c.len() as u64;
                c.clear();
                n
            })
            .unwrap_or(0);
        Ok(deleted)
    }

    async fn bulk_insert(&self, collection: &str, docs: Vec<Document>) -> Result<u64> {
        self.guard()?;
        let inserted = docs.len() as u64;
        let mut collections = self.collections.write();
        let entry = collections.entry(collection.to_string()).or_default();
        for doc in docs {
            entry.insert(doc.id.clone(), doc);
        }
        Ok(inserted)
    }

    async fn upsert_by_id(&self, collection: &str, doc: Document) -> Result<()> {
        self.guard()?;
        let mut collections = self.collections.write();
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(doc.id.clone(), doc);
        Ok(())
    }

    async fn rename_collection(&self, from: &str, to: &str) -> Result<()> {
        self.guard()?;
        let mut collections = self.collections.write();
        let staged = collections.remove(from).ok_or_else(|| {
            BallastError::NotFound(format!("staging collection '{}' does not exist", from))
        })?;
        collections.insert(to.to_string(), staged);
        Ok(())
    }
}

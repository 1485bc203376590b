//! Ledger implementations
//!
//! `HttpLedger` speaks to a permissioned-ledger REST gateway; `MemoryLedger`
//! is a deterministic in-memory append log with a fault switch. Both honor
//! the ledger contract: appends never partially commit, reads reflect only
//! committed data, and `get_all` preserves committed append order.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use ballast_core::{BallastError, GatewayConfig, Ledger, LedgerEntry, Result, TxRef};

#[derive(Serialize)]
struct AppendRequest<'a> {
    key: &'a str,
    entry: &'a LedgerEntry,
}

#[derive(Deserialize)]
struct AppendResponse {
    tx_ref: String,
}

#[derive(Serialize, Deserialize)]
struct KeyedEntry {
    key: String,
    entry: LedgerEntry,
}

/// Client for a ledger REST gateway.
///
/// - `POST {base}/records` with `{key, entry}` -> `{ "tx_ref": "<ref>" }`
/// - `GET  {base}/records/{key}` -> entry or 404
/// - `GET  {base}/records` -> `[{key, entry}, ...]` in committed order
pub struct HttpLedger {
    config: GatewayConfig,
    client: reqwest::Client,
}

impl HttpLedger {
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BallastError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    /// Build from `LEDGER_GATEWAY_URL`.
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var("LEDGER_GATEWAY_URL")
            .map_err(|_| BallastError::Config("LEDGER_GATEWAY_URL not set".to_string()))?;
        Self::new(GatewayConfig::new(base_url))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn append(&self, key: &str, entry: LedgerEntry) -> Result<TxRef> {
        tracing::info!(key = %key, "appending record to ledger");

        let response = self
            .client
            .post(self.url("records"))
            .json(&AppendRequest { key, entry: &entry })
            .send()
            .await
            .map_err(|e| BallastError::Ledger(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BallastError::Ledger(format!(
                "ledger gateway returned status {} for append of {}",
                response.status(),
                key
            )));
        }

        let body: AppendResponse = response
            .json()
            .await
            .map_err(|e| BallastError::Ledger(format!("invalid gateway response: {}", e)))?;

        tracing::info!(key = %key, tx_ref = %body.tx_ref, "ledger append committed");
        Ok(TxRef(body.tx_ref))
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<LedgerEntry>> {
        let response = self
            .client
            .get(self.url(&format!("records/{}", key)))
            .send()
            .await
            .map_err(|e| BallastError::Ledger(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(BallastError::Ledger(format!(
                "ledger gateway returned status {} for {}",
                response.status(),
                key
            )));
        }

        let entry = response
            .json()
            .await
            .map_err(|e| BallastError::Ledger(format!("invalid gateway response: {}", e)))?;
        Ok(Some(entry))
    }

    async fn get_all(&self) -> Result<Vec<(String, LedgerEntry)>> {
        let response = self
            .client
            .get(self.url("records"))
            .send()
            .await
            .map_err(|e| BallastError::Ledger(e.to_string()))?;

        if !response.status().is_success() {
            return Err(BallastError::Ledger(format!(
                "ledger gateway returned status {}",
                response.status()
            )));
        }

        let entries: Vec<KeyedEntry> = response
            .json()
            .await
            .map_err(|e| BallastError::Ledger(format!("invalid gateway response: {}", e)))?;
        Ok(entries.into_iter().map(|e| (e.key, e.entry)).collect())
    }
}

/// In-memory append log preserving commit order, with a fault switch.
#[derive(Default)]
pub struct MemoryLedger {
    entries: RwLock<Vec<(String, LedgerEntry)>>,
    unavailable: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }

    fn guard(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BallastError::Ledger(
                "ledger network unreachable (injected fault)".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn append(&self, key: &str, entry: LedgerEntry) -> Result<TxRef> {
        self.guard()?;
        let mut entries = self.entries.write();
        entries.push((key.to_string(), entry));
        Ok(TxRef(format!("tx-{:06}", entries.len())))
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<LedgerEntry>> {
        self.guard()?;
        // Last committed entry for the key wins
        Ok(self
            .entries
            .read()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, e)| e.clone()))
    }

    async fn get_all(&self) -> Result<Vec<(String, LedgerEntry)>> {
        self.guard()?;
        Ok(self.entries.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ballast_core::{BackupId, BackupStatus};
    use chrono::Utc;

    fn status_entry(id: &str) -> LedgerEntry {
        LedgerEntry::StatusChange {
            backup_id: BackupId::from(id),
            status: BackupStatus::Superseded,
            changed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let ledger = MemoryLedger::new();
        ledger.append("a", status_entry("FULL_A")).await.unwrap();
        ledger.append("b", status_entry("FULL_B")).await.unwrap();
        ledger.append("c", status_entry("FULL_C")).await.unwrap();

        let keys: Vec<String> = ledger
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_get_by_key_returns_latest_committed() {
        let ledger = MemoryLedger::new();
        ledger.append("a", status_entry("FIRST")).await.unwrap();
        ledger.append("a", status_entry("SECOND")).await.unwrap();

        let entry = ledger.get_by_key("a").await.unwrap().unwrap();
        match entry {
            LedgerEntry::StatusChange { backup_id, .. } => {
                assert_eq!(backup_id.as_str(), "SECOND")
            }
            _ => panic!("unexpected entry shape"),
        }
        assert!(ledger.get_by_key("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fault_switch_blocks_appends() {
        let ledger = MemoryLedger::new();
        ledger.set_unavailable(true);
        assert!(ledger.append("a", status_entry("X")).await.is_err());
        assert_eq!(
            {
                ledger.set_unavailable(false);
                ledger.entry_count()
            },
            0
        );
    }
}

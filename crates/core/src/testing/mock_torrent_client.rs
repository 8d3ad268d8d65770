//! Mock torrent client for testing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::torrent::TorrentRecord;
use crate::torrent_client::{CustomFields, Customs, TorrentClient, TorrentClientError};

const CUSTOM_KEYS: &[&str] = &["category", "tags"];

/// A recorded client call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    Hashes,
    DataPrefix(String),
    GetCustoms(String),
    Remove(String),
    Load { hash: String, prefix: String },
    SetCustoms { hash: String, customs: Customs },
}

#[derive(Debug, Clone, Default)]
struct MockEntry {
    prefix: String,
    customs: Customs,
}

/// Mock implementation of the TorrentClient trait.
///
/// Provides controllable behavior for testing:
/// - Seed loaded torrents with a prefix and custom fields
/// - Record every call for assertions
/// - Simulate failures of `hashes`, `remove_torrent` and `load_torrent`
///
/// # Example
///
/// ```rust,ignore
/// let client = MockTorrentClient::new();
/// client.add("abc123", "/downloads").await;
///
/// // ... run the updater ...
///
/// let (prefix, customs) = client.entry("def456").await.unwrap();
/// assert_eq!(prefix, "/downloads");
/// ```
#[derive(Debug)]
pub struct MockTorrentClient {
    torrents: Arc<RwLock<HashMap<String, MockEntry>>>,
    calls: Arc<RwLock<Vec<ClientCall>>>,
    fail_hashes: Arc<RwLock<bool>>,
    fail_load: Arc<RwLock<bool>>,
    fail_remove: Arc<RwLock<bool>>,
    supports_customs: bool,
}

impl Default for MockTorrentClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTorrentClient {
    /// Create a new mock torrent client with `category` and `tags` customs.
    pub fn new() -> Self {
        Self {
            torrents: Arc::new(RwLock::new(HashMap::new())),
            calls: Arc::new(RwLock::new(Vec::new())),
            fail_hashes: Arc::new(RwLock::new(false)),
            fail_load: Arc::new(RwLock::new(false)),
            fail_remove: Arc::new(RwLock::new(false)),
            supports_customs: true,
        }
    }

    /// Create a mock client without custom field support.
    pub fn without_custom_fields() -> Self {
        Self {
            supports_customs: false,
            ..Self::new()
        }
    }

    pub async fn add(&self, hash: &str, prefix: &str) {
        self.add_with_customs(hash, prefix, Customs::new()).await;
    }

    pub async fn add_with_customs(&self, hash: &str, prefix: &str, customs: Customs) {
        self.torrents.write().await.insert(
            hash.to_lowercase(),
            MockEntry {
                prefix: prefix.to_string(),
                customs,
            },
        );
    }

    /// Prefix and customs of a loaded torrent.
    pub async fn entry(&self, hash: &str) -> Option<(String, Customs)> {
        self.torrents
            .read()
            .await
            .get(&hash.to_lowercase())
            .map(|e| (e.prefix.clone(), e.customs.clone()))
    }

    pub async fn calls(&self) -> Vec<ClientCall> {
        self.calls.read().await.clone()
    }

    pub async fn set_fail_hashes(&self, fail: bool) {
        *self.fail_hashes.write().await = fail;
    }

    pub async fn set_fail_load(&self, fail: bool) {
        *self.fail_load.write().await = fail;
    }

    pub async fn set_fail_remove(&self, fail: bool) {
        *self.fail_remove.write().await = fail;
    }

    async fn record(&self, call: ClientCall) {
        self.calls.write().await.push(call);
    }

    async fn require(&self, hash: &str) -> Result<MockEntry, TorrentClientError> {
        self.torrents
            .read()
            .await
            .get(&hash.to_lowercase())
            .cloned()
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))
    }
}

#[async_trait]
impl TorrentClient for MockTorrentClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn hashes(&self) -> Result<HashSet<String>, TorrentClientError> {
        self.record(ClientCall::Hashes).await;
        if *self.fail_hashes.read().await {
            return Err(TorrentClientError::ConnectionFailed(
                "mock connection refused".to_string(),
            ));
        }
        Ok(self.torrents.read().await.keys().cloned().collect())
    }

    async fn has_torrent(&self, hash: &str) -> Result<bool, TorrentClientError> {
        Ok(self.torrents.read().await.contains_key(&hash.to_lowercase()))
    }

    async fn remove_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        self.record(ClientCall::Remove(hash.to_string())).await;
        if *self.fail_remove.read().await {
            return Err(TorrentClientError::ApiError("mock remove failure".to_string()));
        }
        self.torrents
            .write()
            .await
            .remove(&hash.to_lowercase())
            .map(|_| ())
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))
    }

    async fn load_torrent(
        &self,
        torrent: &TorrentRecord,
        prefix: &str,
    ) -> Result<(), TorrentClientError> {
        let hash = torrent
            .info_hash()
            .map_err(|e| TorrentClientError::InvalidTorrent(e.to_string()))?
            .to_string();
        self.record(ClientCall::Load {
            hash: hash.clone(),
            prefix: prefix.to_string(),
        })
        .await;

        if *self.fail_load.read().await {
            return Err(TorrentClientError::ApiError("mock load failure".to_string()));
        }
        self.add(&hash, prefix).await;
        Ok(())
    }

    async fn data_prefix(&self, hash: &str) -> Result<String, TorrentClientError> {
        self.record(ClientCall::DataPrefix(hash.to_string())).await;
        Ok(self.require(hash).await?.prefix)
    }

    fn custom_fields(&self) -> Option<&dyn CustomFields> {
        if self.supports_customs {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl CustomFields for MockTorrentClient {
    fn custom_keys(&self) -> &[&'static str] {
        CUSTOM_KEYS
    }

    async fn get_customs(
        &self,
        hash: &str,
        keys: &[String],
    ) -> Result<Customs, TorrentClientError> {
        self.record(ClientCall::GetCustoms(hash.to_string())).await;
        let entry = self.require(hash).await?;
        keys.iter()
            .map(|key| {
                if !CUSTOM_KEYS.contains(&key.as_str()) {
                    return Err(TorrentClientError::UnsupportedCustom(key.clone()));
                }
                let value = entry.customs.get(key).cloned().unwrap_or_default();
                Ok((key.clone(), value))
            })
            .collect()
    }

    async fn set_customs(&self, hash: &str, customs: &Customs) -> Result<(), TorrentClientError> {
        self.record(ClientCall::SetCustoms {
            hash: hash.to_string(),
            customs: customs.clone(),
        })
        .await;
        if let Some(key) = customs.keys().find(|k| !CUSTOM_KEYS.contains(&k.as_str())) {
            return Err(TorrentClientError::UnsupportedCustom(key.clone()));
        }

        let mut torrents = self.torrents.write().await;
        let entry = torrents
            .get_mut(&hash.to_lowercase())
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))?;
        entry.customs.extend(customs.clone());
        Ok(())
    }
}

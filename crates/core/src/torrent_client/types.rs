//! Types for torrent client operations.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::torrent::TorrentRecord;

/// Errors that can occur during torrent client operations.
#[derive(Debug, Error)]
pub enum TorrentClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Torrent not found: {0}")]
    TorrentNotFound(String),

    #[error("Invalid torrent data: {0}")]
    InvalidTorrent(String),

    #[error("Unsupported custom field: {0}")]
    UnsupportedCustom(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Custom metadata fields, keyed by client-specific name.
pub type Customs = BTreeMap<String, String>;

/// Recovery record persisted while a torrent is out of the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMeta {
    /// Data directory the torrent was loaded at.
    pub prefix: String,
    #[serde(default)]
    pub customs: Customs,
}

/// Capability: read and write custom metadata on a loaded torrent.
#[async_trait]
pub trait CustomFields: Send + Sync {
    /// Keys this client can store.
    fn custom_keys(&self) -> &[&'static str];

    async fn get_customs(&self, hash: &str, keys: &[String])
        -> Result<Customs, TorrentClientError>;

    async fn set_customs(&self, hash: &str, customs: &Customs) -> Result<(), TorrentClientError>;
}

/// Trait for download client backends.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Info-hashes (lowercase hex) of every loaded torrent.
    async fn hashes(&self) -> Result<HashSet<String>, TorrentClientError>;

    async fn has_torrent(&self, hash: &str) -> Result<bool, TorrentClientError>;

    /// Remove a torrent, keeping its downloaded data.
    async fn remove_torrent(&self, hash: &str) -> Result<(), TorrentClientError>;

    /// Load a torrent so that its data lives under `prefix`.
    async fn load_torrent(
        &self,
        torrent: &TorrentRecord,
        prefix: &str,
    ) -> Result<(), TorrentClientError>;

    /// Data directory of a loaded torrent.
    async fn data_prefix(&self, hash: &str) -> Result<String, TorrentClientError>;

    fn custom_fields(&self) -> Option<&dyn CustomFields> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_meta_serialization() {
        let meta = ClientMeta {
            prefix: "/downloads".to_string(),
            customs: Customs::from([("category".to_string(), "movies".to_string())]),
        };
        let json = serde_json::to_string(&meta).unwrap();
        assert_eq!(json, r#"{"prefix":"/downloads","customs":{"category":"movies"}}"#);

        let parsed: ClientMeta = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, meta);
    }

    #[test]
    fn test_client_meta_without_customs() {
        let parsed: ClientMeta = serde_json::from_str(r#"{"prefix":"/d"}"#).unwrap();
        assert_eq!(parsed.prefix, "/d");
        assert!(parsed.customs.is_empty());
    }
}

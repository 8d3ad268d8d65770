//! qBittorrent torrent client implementation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::QBittorrentConfig;
use crate::torrent::TorrentRecord;

use super::{CustomFields, Customs, TorrentClient, TorrentClientError};

const CUSTOM_KEYS: &[&str] = &["category", "tags"];

/// qBittorrent client implementation.
pub struct QBittorrentClient {
    client: Client,
    config: QBittorrentConfig,
    /// Session ID cookie (refreshed on auth failure).
    session: Arc<RwLock<Option<String>>>,
}

impl QBittorrentClient {
    /// Create a new qBittorrent client.
    pub fn new(config: QBittorrentConfig) -> Result<Self, TorrentClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| TorrentClientError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            session: Arc::new(RwLock::new(None)),
        })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    /// Login and store session cookie.
    async fn login(&self) -> Result<(), TorrentClientError> {
        let url = format!("{}/api/v2/auth/login", self.base_url());

        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            // Session cookie is stored by the cookie jar
            let mut session = self.session.write().await;
            *session = Some("authenticated".to_string());
            Ok(())
        } else if body.contains("Fails.") || status.as_u16() == 403 {
            Err(TorrentClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(TorrentClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    /// Ensure we have a valid session, logging in if needed.
    async fn ensure_authenticated(&self) -> Result<(), TorrentClientError> {
        let session = self.session.read().await;
        if session.is_some() {
            return Ok(());
        }
        drop(session);
        self.login().await
    }

    /// Drop the session and log in again after a 403.
    async fn reauthenticate(&self) -> Result<(), TorrentClientError> {
        warn!("qBittorrent session expired, re-authenticating");
        {
            let mut session = self.session.write().await;
            *session = None;
        }
        self.login().await
    }

    /// Make an authenticated GET request.
    async fn get(&self, endpoint: &str) -> Result<String, TorrentClientError> {
        self.ensure_authenticated().await?;

        let url = format!("{}{}", self.base_url(), endpoint);
        let mut response = self.client.get(&url).send().await.map_err(map_send_error)?;

        if response.status().as_u16() == 403 {
            self.reauthenticate().await?;
            response = self.client.get(&url).send().await.map_err(map_send_error)?;
        }

        read_body(response).await
    }

    /// Make an authenticated POST request with form data.
    async fn post_form(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<String, TorrentClientError> {
        self.ensure_authenticated().await?;

        let url = format!("{}{}", self.base_url(), endpoint);
        let mut response = self
            .client
            .post(&url)
            .form(params)
            .send()
            .await
            .map_err(map_send_error)?;

        if response.status().as_u16() == 403 {
            self.reauthenticate().await?;
            response = self
                .client
                .post(&url)
                .form(params)
                .send()
                .await
                .map_err(map_send_error)?;
        }

        read_body(response).await
    }

    /// Make an authenticated POST request with multipart data.
    async fn post_multipart(
        &self,
        endpoint: &str,
        form: multipart::Form,
    ) -> Result<String, TorrentClientError> {
        self.ensure_authenticated().await?;

        let url = format!("{}{}", self.base_url(), endpoint);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(map_send_error)?;

        read_body(response).await
    }

    /// Info for the given hash, if loaded.
    async fn find(&self, hash: &str) -> Result<Option<QBTorrentInfo>, TorrentClientError> {
        let endpoint = format!("/api/v2/torrents/info?hashes={}", hash.to_lowercase());
        let response = self.get(&endpoint).await?;
        let torrents = parse_info_list(&response)?;
        Ok(torrents.into_iter().next())
    }

    async fn require(&self, hash: &str) -> Result<QBTorrentInfo, TorrentClientError> {
        self.find(hash)
            .await?
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))
    }
}

fn map_send_error(e: reqwest::Error) -> TorrentClientError {
    if e.is_timeout() {
        TorrentClientError::Timeout
    } else if e.is_connect() {
        TorrentClientError::ConnectionFailed(e.to_string())
    } else {
        TorrentClientError::ApiError(e.to_string())
    }
}

async fn read_body(response: reqwest::Response) -> Result<String, TorrentClientError> {
    let status = response.status();
    if !status.is_success() {
        return Err(TorrentClientError::ApiError(format!("HTTP {}", status)));
    }

    response
        .text()
        .await
        .map_err(|e| TorrentClientError::ApiError(e.to_string()))
}

/// qBittorrent torrent info response (only the fields used here).
#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    hash: String,
    #[serde(default)]
    save_path: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    tags: String,
}

impl QBTorrentInfo {
    fn custom(&self, key: &str) -> Option<String> {
        match key {
            "category" => Some(self.category.clone()),
            "tags" => Some(normalize_tags(&self.tags)),
            _ => None,
        }
    }
}

fn parse_info_list(response: &str) -> Result<Vec<QBTorrentInfo>, TorrentClientError> {
    serde_json::from_str(response)
        .map_err(|e| TorrentClientError::ApiError(format!("Failed to parse response: {}", e)))
}

/// qBittorrent reports tags as ", "-separated; store them as ",".
fn normalize_tags(tags: &str) -> String {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl TorrentClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn hashes(&self) -> Result<HashSet<String>, TorrentClientError> {
        let response = self.get("/api/v2/torrents/info").await?;
        Ok(parse_info_list(&response)?
            .into_iter()
            .map(|t| t.hash.to_lowercase())
            .collect())
    }

    async fn has_torrent(&self, hash: &str) -> Result<bool, TorrentClientError> {
        Ok(self.find(hash).await?.is_some())
    }

    async fn remove_torrent(&self, hash: &str) -> Result<(), TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        self.post_form(
            "/api/v2/torrents/delete",
            &[("hashes", &hash_lower), ("deleteFiles", "false")],
        )
        .await?;
        Ok(())
    }

    async fn load_torrent(
        &self,
        torrent: &TorrentRecord,
        prefix: &str,
    ) -> Result<(), TorrentClientError> {
        let filename = torrent
            .path()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "torrent.torrent".to_string());

        let file_part = multipart::Part::bytes(torrent.raw_bytes().to_vec())
            .file_name(filename)
            .mime_str("application/x-bittorrent")
            .map_err(|e| TorrentClientError::InvalidTorrent(e.to_string()))?;

        let form = multipart::Form::new()
            .part("torrents", file_part)
            .text("savepath", prefix.to_string());

        let body = self.post_multipart("/api/v2/torrents/add", form).await?;
        if body.contains("Fails.") {
            return Err(TorrentClientError::InvalidTorrent(
                "qBittorrent rejected the torrent".to_string(),
            ));
        }
        Ok(())
    }

    async fn data_prefix(&self, hash: &str) -> Result<String, TorrentClientError> {
        Ok(self.require(hash).await?.save_path)
    }

    fn custom_fields(&self) -> Option<&dyn CustomFields> {
        Some(self)
    }
}

#[async_trait]
impl CustomFields for QBittorrentClient {
    fn custom_keys(&self) -> &[&'static str] {
        CUSTOM_KEYS
    }

    async fn get_customs(
        &self,
        hash: &str,
        keys: &[String],
    ) -> Result<Customs, TorrentClientError> {
        let info = self.require(hash).await?;
        keys.iter()
            .map(|key| {
                info.custom(key)
                    .map(|value| (key.clone(), value))
                    .ok_or_else(|| TorrentClientError::UnsupportedCustom(key.clone()))
            })
            .collect()
    }

    async fn set_customs(&self, hash: &str, customs: &Customs) -> Result<(), TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        for (key, value) in customs {
            match key.as_str() {
                "category" => {
                    if !value.is_empty() {
                        // 409 when the category already exists
                        if let Err(e) = self
                            .post_form("/api/v2/torrents/createCategory", &[("category", value)])
                            .await
                        {
                            debug!(category = %value, error = %e, "createCategory failed");
                        }
                    }
                    self.post_form(
                        "/api/v2/torrents/setCategory",
                        &[("hashes", &hash_lower), ("category", value)],
                    )
                    .await?;
                }
                "tags" => {
                    self.post_form("/api/v2/torrents/removeTags", &[("hashes", &hash_lower)])
                        .await?;
                    if !value.is_empty() {
                        self.post_form(
                            "/api/v2/torrents/addTags",
                            &[("hashes", &hash_lower), ("tags", value)],
                        )
                        .await?;
                    }
                }
                other => return Err(TorrentClientError::UnsupportedCustom(other.to_string())),
            }
        }
        Ok(())
    }
}

//! Tracker plugin interface.
//!
//! A tracker plugin knows one site: which torrents it published (by comment),
//! how to tell whether a torrent is stale, and how to download the fresh
//! bytes. Staleness checks and session handling are separate capability
//! traits; a plugin exposes the ones it implements.

use async_trait::async_trait;
use thiserror::Error;

use crate::fetch::FetchError;
use crate::torrent::TorrentRecord;

/// Domain errors a tracker plugin reports.
///
/// These become `tracker_error` outcomes. Anything else that goes wrong while
/// talking to a tracker is treated as unexpected.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Failed to parse tracker response: {0}")]
    Parse(String),

    #[error(transparent)]
    Network(#[from] FetchError),
}

impl TrackerError {
    /// Stable error name for reports.
    pub fn name(&self) -> &'static str {
        match self {
            TrackerError::Auth(_) => "AuthError",
            TrackerError::Parse(_) => "ParseError",
            TrackerError::Network(_) => "NetworkError",
        }
    }
}

/// Capability: compare a remotely fetched info-hash.
#[async_trait]
pub trait RemoteHash: Send + Sync {
    async fn fetch_remote_hash(&self, torrent: &TorrentRecord) -> Result<String, TrackerError>;
}

/// Capability: ask a scrape endpoint whether the torrent is still registered.
#[async_trait]
pub trait ScrapeRegistration: Send + Sync {
    async fn is_registered(
        &self,
        torrent: &TorrentRecord,
        scrape_hash: &str,
    ) -> Result<bool, TrackerError>;
}

/// Capability: fetch the remote upload/modify time, in epoch seconds, already
/// normalized from the site's timezone.
#[async_trait]
pub trait RemoteTimestamp: Send + Sync {
    async fn fetch_remote_timestamp(&self, torrent: &TorrentRecord) -> Result<i64, TrackerError>;
}

/// Capability: startup hooks, run once before any torrent is processed.
#[async_trait]
pub trait TrackerSession: Send + Sync {
    async fn test_connectivity(&self) -> Result<(), TrackerError>;
    async fn login(&self) -> Result<(), TrackerError>;
}

/// The staleness check a tracker uses. Exactly one per tracker.
#[derive(Clone, Copy)]
pub enum StaleCheck<'a> {
    Hash(&'a dyn RemoteHash),
    Scrape(&'a dyn ScrapeRegistration),
    Timestamp(&'a dyn RemoteTimestamp),
}

impl StaleCheck<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            StaleCheck::Hash(_) => "hash",
            StaleCheck::Scrape(_) => "scrape",
            StaleCheck::Timestamp(_) => "timestamp",
        }
    }
}

/// A tracker plugin.
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Name for logs and reports.
    fn name(&self) -> &str;

    /// Whether this tracker published `torrent`.
    fn matches(&self, torrent: &TorrentRecord) -> bool;

    fn stale_check(&self) -> StaleCheck<'_>;

    /// Download the current torrent bytes from the site.
    async fn fetch_new_data(&self, torrent: &TorrentRecord) -> Result<Vec<u8>, TrackerError>;

    fn session(&self) -> Option<&dyn TrackerSession> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::OpenError;

    #[test]
    fn test_error_names() {
        assert_eq!(TrackerError::Auth("x".into()).name(), "AuthError");
        assert_eq!(TrackerError::Parse("x".into()).name(), "ParseError");
        let network = TrackerError::from(FetchError {
            url: "http://x".into(),
            attempts: 3,
            source: OpenError::Timeout,
        });
        assert_eq!(network.name(), "NetworkError");
        assert!(network.to_string().contains("3 attempt(s)"));
    }
}

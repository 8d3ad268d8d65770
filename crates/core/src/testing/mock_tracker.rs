//! Mock tracker plugin for testing.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::config::CheckKind;
use crate::fetch::{FetchError, OpenError};
use crate::torrent::TorrentRecord;
use crate::tracker::{
    RemoteHash, RemoteTimestamp, ScrapeRegistration, StaleCheck, Tracker, TrackerError,
    TrackerSession,
};

/// How a scripted call fails.
#[derive(Debug, Clone)]
pub enum MockFailure {
    Auth(String),
    Parse(String),
    /// Retries exhausted against this URL.
    Network(String),
    /// Panic inside the plugin.
    Panic(String),
}

impl MockFailure {
    fn raise(&self) -> TrackerError {
        match self {
            MockFailure::Auth(msg) => TrackerError::Auth(msg.clone()),
            MockFailure::Parse(msg) => TrackerError::Parse(msg.clone()),
            MockFailure::Network(url) => TrackerError::Network(FetchError {
                url: url.clone(),
                attempts: 1,
                source: OpenError::Timeout,
            }),
            MockFailure::Panic(msg) => panic!("{}", msg),
        }
    }
}

/// Scripted tracker plugin.
///
/// Matches torrents whose comment contains `comment_contains` and answers the
/// staleness check and download from preset values.
///
/// # Example
///
/// ```rust,ignore
/// let tracker = MockTracker::new("site", "https://site/", CheckKind::Hash)
///     .with_remote_hash("abc")
///     .with_new_data(bytes);
/// ```
#[derive(Debug)]
pub struct MockTracker {
    name: String,
    comment_contains: String,
    check: CheckKind,
    remote_hash: Option<String>,
    registered: Option<bool>,
    remote_timestamp: Option<i64>,
    new_data: Option<Vec<u8>>,
    check_failure: Option<MockFailure>,
    fetch_failure: Option<MockFailure>,
    has_session: bool,
    check_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    login_calls: AtomicUsize,
}

impl MockTracker {
    pub fn new(name: &str, comment_contains: &str, check: CheckKind) -> Self {
        Self {
            name: name.to_string(),
            comment_contains: comment_contains.to_string(),
            check,
            remote_hash: None,
            registered: None,
            remote_timestamp: None,
            new_data: None,
            check_failure: None,
            fetch_failure: None,
            has_session: false,
            check_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_remote_hash(mut self, hash: &str) -> Self {
        self.remote_hash = Some(hash.to_string());
        self
    }

    pub fn with_registered(mut self, registered: bool) -> Self {
        self.registered = Some(registered);
        self
    }

    pub fn with_remote_timestamp(mut self, timestamp: i64) -> Self {
        self.remote_timestamp = Some(timestamp);
        self
    }

    pub fn with_new_data(mut self, data: Vec<u8>) -> Self {
        self.new_data = Some(data);
        self
    }

    pub fn failing_check(mut self, failure: MockFailure) -> Self {
        self.check_failure = Some(failure);
        self
    }

    pub fn failing_fetch(mut self, failure: MockFailure) -> Self {
        self.fetch_failure = Some(failure);
        self
    }

    /// Expose login/connectivity hooks.
    pub fn with_session(mut self) -> Self {
        self.has_session = true;
        self
    }

    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    fn checked<T: Clone>(&self, value: &Option<T>, what: &str) -> Result<T, TrackerError> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = &self.check_failure {
            return Err(failure.raise());
        }
        value
            .clone()
            .ok_or_else(|| TrackerError::Parse(format!("no {} scripted", what)))
    }
}

#[async_trait]
impl Tracker for MockTracker {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, torrent: &TorrentRecord) -> bool {
        torrent
            .comment()
            .is_some_and(|c| c.contains(&self.comment_contains))
    }

    fn stale_check(&self) -> StaleCheck<'_> {
        match self.check {
            CheckKind::Hash => StaleCheck::Hash(self),
            CheckKind::Scrape => StaleCheck::Scrape(self),
            CheckKind::Timestamp => StaleCheck::Timestamp(self),
        }
    }

    async fn fetch_new_data(&self, _torrent: &TorrentRecord) -> Result<Vec<u8>, TrackerError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = &self.fetch_failure {
            return Err(failure.raise());
        }
        self.new_data
            .clone()
            .ok_or_else(|| TrackerError::Parse("no new data scripted".to_string()))
    }

    fn session(&self) -> Option<&dyn TrackerSession> {
        if self.has_session {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl RemoteHash for MockTracker {
    async fn fetch_remote_hash(&self, _torrent: &TorrentRecord) -> Result<String, TrackerError> {
        self.checked(&self.remote_hash, "remote hash")
    }
}

#[async_trait]
impl ScrapeRegistration for MockTracker {
    async fn is_registered(
        &self,
        _torrent: &TorrentRecord,
        _scrape_hash: &str,
    ) -> Result<bool, TrackerError> {
        self.checked(&self.registered, "registration")
    }
}

#[async_trait]
impl RemoteTimestamp for MockTracker {
    async fn fetch_remote_timestamp(&self, _torrent: &TorrentRecord) -> Result<i64, TrackerError> {
        self.checked(&self.remote_timestamp, "remote timestamp")
    }
}

#[async_trait]
impl TrackerSession for MockTracker {
    async fn test_connectivity(&self) -> Result<(), TrackerError> {
        Ok(())
    }

    async fn login(&self) -> Result<(), TrackerError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

//! Types for the fetch layer.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::FetchConfig;

/// A single HTTP request.
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    pub url: String,
    /// Request body. A request with a body is sent as POST.
    pub data: Option<Vec<u8>>,
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn post(url: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            url: url.into(),
            data: Some(data),
            headers: Vec::new(),
        }
    }

    /// URL-encoded form body.
    pub fn post_form<'a>(
        url: impl Into<String>,
        form: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let body = form
            .into_iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        Self::post(url, body.into_bytes()).with_header(
            "Content-Type",
            "application/x-www-form-urlencoded",
        )
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Failure of a single attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OpenError {
    #[error("Request timeout")]
    Timeout,

    #[error("HTTP {0}")]
    Status(u16),

    /// Connection reset, truncated body, garbled status line.
    #[error("Transient connection error: {0}")]
    Transient(String),

    #[error("Request failed: {0}")]
    Other(String),
}

/// The error surfaced once a fetch gives up.
#[derive(Debug, Clone, Error)]
#[error("Fetching {url} failed after {attempts} attempt(s): {source}")]
pub struct FetchError {
    pub url: String,
    pub attempts: u32,
    #[source]
    pub source: OpenError,
}

/// Performs one attempt of a request.
#[async_trait]
pub trait Opener: Send + Sync {
    async fn open(&self, request: &FetchRequest, timeout: Duration) -> Result<Vec<u8>, OpenError>;
}

/// Retry policy shared by every caller of the fetch layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    /// Extra attempts after the first one.
    pub max_retries: u32,
    /// Constant delay between attempts.
    pub retry_delay: Duration,
    pub retry_codes: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&FetchConfig::default())
    }
}

impl From<&FetchConfig> for RetryPolicy {
    fn from(config: &FetchConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            retry_codes: config.retry_codes.clone(),
        }
    }
}

impl RetryPolicy {
    /// Whether a failed attempt may be retried.
    pub fn is_retryable(&self, error: &OpenError) -> bool {
        match error {
            OpenError::Timeout | OpenError::Transient(_) => true,
            OpenError::Status(code) => self.retry_codes.contains(code),
            OpenError::Other(_) => false,
        }
    }
}

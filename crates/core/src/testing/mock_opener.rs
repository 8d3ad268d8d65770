//! Mock HTTP opener for testing.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::fetch::{FetchRequest, OpenError, Opener};

/// Scripted [`Opener`]: answers each URL from a FIFO queue.
///
/// An URL with nothing queued fails with [`OpenError::Other`], which the
/// retry layer does not retry.
///
/// # Example
///
/// ```rust,ignore
/// let opener = MockOpener::new();
/// opener.respond("http://x/", Err(OpenError::Timeout)).await;
/// opener.respond("http://x/", Ok(b"body".to_vec())).await;
/// ```
#[derive(Debug, Default)]
pub struct MockOpener {
    responses: RwLock<HashMap<String, VecDeque<Result<Vec<u8>, OpenError>>>>,
    requests: RwLock<Vec<FetchRequest>>,
}

impl MockOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next response for `url`.
    pub async fn respond(&self, url: &str, response: Result<Vec<u8>, OpenError>) {
        self.responses
            .write()
            .await
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    /// Every request seen so far, in order.
    pub async fn requests(&self) -> Vec<FetchRequest> {
        self.requests.read().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.requests.read().await.len()
    }
}

#[async_trait]
impl Opener for MockOpener {
    async fn open(
        &self,
        request: &FetchRequest,
        _timeout: Duration,
    ) -> Result<Vec<u8>, OpenError> {
        self.requests.write().await.push(request.clone());
        self.responses
            .write()
            .await
            .get_mut(&request.url)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(OpenError::Other(format!("no response for {}", request.url))))
    }
}

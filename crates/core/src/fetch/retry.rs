//! Bounded constant-delay retry.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{FetchError, FetchRequest, Opener, RetryPolicy};

/// Run `request` through `opener`, retrying per `policy`.
///
/// Retryable failures consume one retry each and sleep `retry_delay` before
/// the next attempt. A non-retryable failure, or the last retryable one once
/// retries run out, is returned as-is.
pub async fn fetch(
    opener: &dyn Opener,
    request: &FetchRequest,
    policy: &RetryPolicy,
) -> Result<Vec<u8>, FetchError> {
    let mut retries_left = policy.max_retries;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        debug!(url = %request.url, attempt = attempts, "Fetching");

        let error = match opener.open(request, policy.timeout).await {
            Ok(body) => return Ok(body),
            Err(e) => e,
        };

        if !policy.is_retryable(&error) || retries_left == 0 {
            return Err(FetchError {
                url: request.url.clone(),
                attempts,
                source: error,
            });
        }

        retries_left -= 1;
        warn!(
            url = %request.url,
            error = %error,
            retries_left,
            "Retrying request"
        );
        if !policy.retry_delay.is_zero() {
            tokio::time::sleep(policy.retry_delay).await;
        }
    }
}

/// An opener bundled with the process-wide retry policy.
///
/// Cheap to clone; every tracker plugin holds one.
#[derive(Clone)]
pub struct Fetcher {
    opener: Arc<dyn Opener>,
    policy: RetryPolicy,
}

impl Fetcher {
    pub fn new(opener: Arc<dyn Opener>, policy: RetryPolicy) -> Self {
        Self { opener, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn request(&self, request: &FetchRequest) -> Result<Vec<u8>, FetchError> {
        fetch(self.opener.as_ref(), request, &self.policy).await
    }

    pub async fn get(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.request(&FetchRequest::get(url)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::OpenError;
    use crate::testing::MockOpener;
    use std::time::Duration;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(1),
            max_retries,
            retry_delay: Duration::ZERO,
            retry_codes: vec![503],
        }
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let opener = MockOpener::new();
        opener.respond("http://x/", Ok(b"body".to_vec())).await;

        let body = fetch(&opener, &FetchRequest::get("http://x/"), &policy(3))
            .await
            .unwrap();
        assert_eq!(body, b"body");
        assert_eq!(opener.request_count().await, 1);
    }

    #[tokio::test]
    async fn test_retries_timeouts_then_succeeds() {
        let opener = MockOpener::new();
        opener.respond("http://x/", Err(OpenError::Timeout)).await;
        opener.respond("http://x/", Err(OpenError::Status(503))).await;
        opener.respond("http://x/", Ok(b"ok".to_vec())).await;

        let body = fetch(&opener, &FetchRequest::get("http://x/"), &policy(2))
            .await
            .unwrap();
        assert_eq!(body, b"ok");
        assert_eq!(opener.request_count().await, 3);
    }

    #[tokio::test]
    async fn test_exhausted_surfaces_last_error() {
        let opener = MockOpener::new();
        opener.respond("http://x/", Err(OpenError::Timeout)).await;
        opener
            .respond("http://x/", Err(OpenError::Transient("reset".into())))
            .await;
        opener.respond("http://x/", Ok(b"too late".to_vec())).await;

        let err = fetch(&opener, &FetchRequest::get("http://x/"), &policy(1))
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 2);
        assert_eq!(err.source, OpenError::Transient("reset".into()));
    }

    #[tokio::test]
    async fn test_non_retryable_status_fails_immediately() {
        let opener = MockOpener::new();
        opener.respond("http://x/", Err(OpenError::Status(404))).await;
        opener.respond("http://x/", Ok(b"never".to_vec())).await;

        let err = fetch(&opener, &FetchRequest::get("http://x/"), &policy(5))
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 1);
        assert_eq!(err.source, OpenError::Status(404));
        assert_eq!(opener.request_count().await, 1);
    }

    #[tokio::test]
    async fn test_other_error_not_retried() {
        let opener = MockOpener::new();
        opener
            .respond("http://x/", Err(OpenError::Other("dns".into())))
            .await;

        let err = fetch(&opener, &FetchRequest::get("http://x/"), &policy(5))
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 1);
    }

    fn paced(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            retry_delay: Duration::from_secs(1),
            ..policy(max_retries)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_delay_is_constant() {
        let opener = MockOpener::new();
        for _ in 0..3 {
            opener.respond("http://x/", Err(OpenError::Status(503))).await;
        }
        opener.respond("http://x/", Ok(b"ok".to_vec())).await;

        let start = tokio::time::Instant::now();
        let body = fetch(&opener, &FetchRequest::get("http://x/"), &paced(3))
            .await
            .unwrap();
        assert_eq!(body, b"ok");
        // 1s + 1s + 1s, not 1s + 2s + 4s
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_delay_after_final_failure() {
        let opener = MockOpener::new();
        opener.respond("http://x/", Err(OpenError::Timeout)).await;
        opener.respond("http://x/", Err(OpenError::Status(503))).await;
        opener.respond("http://x/", Err(OpenError::Status(404))).await;

        let start = tokio::time::Instant::now();
        let err = fetch(&opener, &FetchRequest::get("http://x/"), &paced(5))
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 3);
        assert_eq!(err.source, OpenError::Status(404));
        assert_eq!(start.elapsed(), Duration::from_secs(2));

        let opener = MockOpener::new();
        opener.respond("http://x/", Err(OpenError::Timeout)).await;
        opener.respond("http://x/", Err(OpenError::Timeout)).await;

        let start = tokio::time::Instant::now();
        let err = fetch(&opener, &FetchRequest::get("http://x/"), &paced(1))
            .await
            .unwrap_err();
        assert_eq!(err.attempts, 2);
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[test]
    fn test_post_form_encoding() {
        let request = FetchRequest::post_form("http://x/login", [("user", "a b"), ("pass", "p&q")]);
        assert_eq!(request.data.as_deref(), Some(b"user=a%20b&pass=p%26q".as_slice()));
        assert!(request
            .headers
            .iter()
            .any(|(k, v)| k == "Content-Type" && v == "application/x-www-form-urlencoded"));
    }
}

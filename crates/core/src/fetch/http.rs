//! `reqwest`-backed opener.

use std::error::Error as StdError;
use std::io::ErrorKind;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::FetchConfig;

use super::{FetchRequest, OpenError, Opener};

/// HTTP opener with a shared cookie jar, so a tracker login persists across
/// requests.
pub struct HttpOpener {
    client: Client,
}

impl HttpOpener {
    pub fn new(config: &FetchConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .cookie_store(true)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Opener for HttpOpener {
    async fn open(&self, request: &FetchRequest, timeout: Duration) -> Result<Vec<u8>, OpenError> {
        let mut builder = match &request.data {
            Some(data) => self.client.post(&request.url).body(data.clone()),
            None => self.client.get(&request.url),
        };
        builder = builder.timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            debug!(url = %request.url, status = status.as_u16(), "Non-success status");
            return Err(OpenError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(classify)?;
        Ok(body.to_vec())
    }
}

/// Map a `reqwest` failure onto the retry taxonomy.
fn classify(error: reqwest::Error) -> OpenError {
    if error.is_timeout() {
        return OpenError::Timeout;
    }
    if error.is_body() || error.is_decode() || has_transient_io_cause(&error) {
        return OpenError::Transient(error.to_string());
    }
    OpenError::Other(error.to_string())
}

fn has_transient_io_cause(error: &(dyn StdError + 'static)) -> bool {
    let mut current = error.source();
    while let Some(cause) = current {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::UnexpectedEof
                    | ErrorKind::BrokenPipe
            ) {
                return true;
            }
        }
        if cause.to_string().contains("invalid HTTP status-code") {
            return true;
        }
        current = cause.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Wrapper(std::io::Error);

    impl std::fmt::Display for Wrapper {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "wrapper")
        }
    }

    impl StdError for Wrapper {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_transient_io_detection() {
        let reset = Wrapper(std::io::Error::new(ErrorKind::ConnectionReset, "reset"));
        assert!(has_transient_io_cause(&reset));

        let refused = Wrapper(std::io::Error::new(ErrorKind::ConnectionRefused, "refused"));
        assert!(!has_transient_io_cause(&refused));
    }

    #[test]
    fn test_opener_builds_with_defaults() {
        assert!(HttpOpener::new(&FetchConfig::default()).is_ok());
    }
}

use std::collections::HashSet;

use regex_lite::Regex;

use super::{
    types::{CheckKind, ClientConfig, Config, TrackerConfig},
    ConfigError,
};
use crate::torrent_client::is_known_client_backend;
use crate::tracker::{is_known_tracker_plugin, parse_offset};

/// Validate configuration.
///
/// Checks everything that can be checked without touching the network, so
/// that a bad config fails before the lock is taken.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.core.torrents_dir.as_os_str().is_empty() {
        return Err(invalid("core.torrents_dir cannot be empty"));
    }

    if config.fetch.timeout_secs == 0 {
        return Err(invalid("fetch.timeout_secs cannot be 0"));
    }
    if let Some(code) = config
        .fetch
        .retry_codes
        .iter()
        .find(|c| !(100..=599).contains(*c))
    {
        return Err(invalid(format!(
            "fetch.retry_codes: {} is not an HTTP status",
            code
        )));
    }

    let mut names = HashSet::new();
    for tracker in &config.trackers {
        validate_tracker(tracker)?;
        if !names.insert(tracker.name.as_str()) {
            return Err(invalid(format!("duplicate tracker name '{}'", tracker.name)));
        }
    }

    if let Some(client) = &config.client {
        validate_client(client)?;
    }

    Ok(())
}

fn validate_tracker(tracker: &TrackerConfig) -> Result<(), ConfigError> {
    if tracker.name.trim().is_empty() {
        return Err(invalid("tracker name cannot be empty"));
    }
    let fail = |msg: String| invalid(format!("tracker '{}': {}", tracker.name, msg));

    if !is_known_tracker_plugin(&tracker.plugin) {
        return Err(fail(format!("unknown plugin '{}'", tracker.plugin)));
    }
    if tracker.download_url.is_empty() {
        return Err(fail("download_url cannot be empty".to_string()));
    }

    check_regex(&tracker.comment_pattern).map_err(|e| fail(format!("comment_pattern: {}", e)))?;

    match tracker.check {
        CheckKind::Hash => {}
        CheckKind::Scrape => {
            if tracker.scrape_url.is_none() {
                return Err(fail("check = \"scrape\" requires scrape_url".to_string()));
            }
        }
        CheckKind::Timestamp => {
            if tracker.page_url.is_none() {
                return Err(fail("check = \"timestamp\" requires page_url".to_string()));
            }
            let Some(pattern) = &tracker.timestamp_pattern else {
                return Err(fail(
                    "check = \"timestamp\" requires timestamp_pattern".to_string(),
                ));
            };
            check_regex(pattern).map_err(|e| fail(format!("timestamp_pattern: {}", e)))?;
        }
    }

    if let Some(tz) = &tracker.timezone {
        if parse_offset(tz).is_none() {
            return Err(fail(format!("invalid timezone '{}'", tz)));
        }
    }

    if let Some(login) = &tracker.login {
        if login.url.is_empty() {
            return Err(fail("login.url cannot be empty".to_string()));
        }
        if let Some(pattern) = &login.failure_pattern {
            check_regex(pattern).map_err(|e| fail(format!("login.failure_pattern: {}", e)))?;
        }
    }

    Ok(())
}

fn validate_client(client: &ClientConfig) -> Result<(), ConfigError> {
    if !is_known_client_backend(&client.backend) {
        return Err(invalid(format!(
            "unknown client backend '{}'",
            client.backend
        )));
    }
    if client.backend == "qbittorrent" {
        match &client.qbittorrent {
            None => {
                return Err(invalid(
                    "client.qbittorrent section required when backend = \"qbittorrent\"",
                ))
            }
            Some(qb) if qb.url.is_empty() => {
                return Err(invalid("client.qbittorrent.url cannot be empty"))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn check_regex(pattern: &str) -> Result<(), String> {
    Regex::new(pattern).map(|_| ()).map_err(|e| e.to_string())
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

//! Configurable regex-driven tracker plugin.
//!
//! Covers sites whose torrent pages can be located from the torrent comment
//! and whose staleness is visible through the torrent itself, a scrape
//! endpoint, or an upload time printed on the details page.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use regex_lite::Regex;
use serde_bencode::value::Value;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::{CheckKind, ConfigError, TrackerConfig};
use crate::fetch::{FetchRequest, Fetcher};
use crate::torrent::{decode, TorrentRecord};

use super::{
    RemoteHash, RemoteTimestamp, ScrapeRegistration, StaleCheck, Tracker, TrackerError,
    TrackerSession,
};

/// Generic tracker plugin.
pub struct GenericTracker {
    config: TrackerConfig,
    comment_re: Regex,
    timestamp_re: Option<Regex>,
    login_failure_re: Option<Regex>,
    offset: FixedOffset,
    fetcher: Fetcher,
    /// Last download made by the hash check, keyed by the local info-hash,
    /// so the following `fetch_new_data` does not download it again.
    downloaded: Mutex<Option<(String, Vec<u8>)>>,
}

impl GenericTracker {
    pub fn new(config: TrackerConfig, fetcher: Fetcher) -> Result<Self, ConfigError> {
        let comment_re = compile(&config.name, "comment_pattern", &config.comment_pattern)?;

        let timestamp_re = match (&config.check, &config.timestamp_pattern) {
            (CheckKind::Timestamp, Some(pattern)) => {
                Some(compile(&config.name, "timestamp_pattern", pattern)?)
            }
            (CheckKind::Timestamp, None) => {
                return Err(ConfigError::ValidationError(format!(
                    "tracker '{}': check = \"timestamp\" requires timestamp_pattern",
                    config.name
                )))
            }
            _ => None,
        };

        let login_failure_re = config
            .login
            .as_ref()
            .and_then(|l| l.failure_pattern.as_deref())
            .map(|p| compile(&config.name, "login.failure_pattern", p))
            .transpose()?;

        let offset = match config.timezone.as_deref() {
            Some(tz) => parse_offset(tz).ok_or_else(|| {
                ConfigError::ValidationError(format!(
                    "tracker '{}': invalid timezone '{}'",
                    config.name, tz
                ))
            })?,
            None => utc(),
        };

        Ok(Self {
            config,
            comment_re,
            timestamp_re,
            login_failure_re,
            offset,
            fetcher,
            downloaded: Mutex::new(None),
        })
    }

    /// The `{id}` extracted from the torrent comment.
    fn torrent_id(&self, torrent: &TorrentRecord) -> Result<String, TrackerError> {
        let comment = torrent
            .comment()
            .ok_or_else(|| TrackerError::Parse("torrent has no comment".to_string()))?;
        let captures = self.comment_re.captures(&comment).ok_or_else(|| {
            TrackerError::Parse(format!("comment '{}' does not match", comment))
        })?;
        let id = captures
            .get(1)
            .or_else(|| captures.get(0))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        Ok(id)
    }

    fn render_url(
        &self,
        template: &str,
        torrent: &TorrentRecord,
    ) -> Result<String, TrackerError> {
        let mut url = template.replace("{id}", &self.torrent_id(torrent)?);
        if url.contains("{hash}") || url.contains("{scrape_hash}") {
            let hash = torrent
                .info_hash()
                .map_err(|e| TrackerError::Parse(e.to_string()))?;
            let scrape = torrent
                .scrape_hash()
                .map_err(|e| TrackerError::Parse(e.to_string()))?;
            url = url.replace("{scrape_hash}", &scrape).replace("{hash}", hash);
        }
        Ok(url)
    }

    fn request(&self, url: String) -> FetchRequest {
        self.config
            .headers
            .iter()
            .fold(FetchRequest::get(url), |req, (k, v)| req.with_header(k.clone(), v.clone()))
    }

    async fn download_torrent(&self, torrent: &TorrentRecord) -> Result<Vec<u8>, TrackerError> {
        let url = self.render_url(&self.config.download_url, torrent)?;
        debug!(tracker = %self.config.name, url = %url, "Downloading torrent");
        let data = self.fetcher.request(&self.request(url)).await?;
        TorrentRecord::from_bytes(data.clone())
            .map_err(|e| TrackerError::Parse(format!("downloaded data is not a torrent: {}", e)))?;
        Ok(data)
    }
}

#[async_trait]
impl Tracker for GenericTracker {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn matches(&self, torrent: &TorrentRecord) -> bool {
        torrent
            .comment()
            .map(|c| self.comment_re.is_match(&c))
            .unwrap_or(false)
    }

    fn stale_check(&self) -> StaleCheck<'_> {
        match self.config.check {
            CheckKind::Hash => StaleCheck::Hash(self),
            CheckKind::Scrape => StaleCheck::Scrape(self),
            CheckKind::Timestamp => StaleCheck::Timestamp(self),
        }
    }

    async fn fetch_new_data(&self, torrent: &TorrentRecord) -> Result<Vec<u8>, TrackerError> {
        let cached = self.downloaded.lock().await.take();
        if let (Some((hash, data)), Ok(local)) = (cached, torrent.info_hash()) {
            if hash == local {
                debug!(tracker = %self.config.name, hash = %hash, "Reusing downloaded torrent");
                return Ok(data);
            }
        }
        self.download_torrent(torrent).await
    }

    fn session(&self) -> Option<&dyn TrackerSession> {
        if self.config.login.is_some() || self.config.test_url.is_some() {
            Some(self)
        } else {
            None
        }
    }
}

#[async_trait]
impl RemoteHash for GenericTracker {
    async fn fetch_remote_hash(&self, torrent: &TorrentRecord) -> Result<String, TrackerError> {
        let local = torrent
            .info_hash()
            .map_err(|e| TrackerError::Parse(e.to_string()))?
            .to_string();
        let data = self.download_torrent(torrent).await?;
        let remote = TorrentRecord::from_bytes(data.clone())
            .map_err(|e| TrackerError::Parse(e.to_string()))?;
        let remote_hash = remote
            .info_hash()
            .map(str::to_string)
            .map_err(|e| TrackerError::Parse(e.to_string()))?;
        *self.downloaded.lock().await = Some((local, data));
        Ok(remote_hash)
    }
}

#[async_trait]
impl ScrapeRegistration for GenericTracker {
    async fn is_registered(
        &self,
        torrent: &TorrentRecord,
        _scrape_hash: &str,
    ) -> Result<bool, TrackerError> {
        let template = self.config.scrape_url.as_deref().ok_or_else(|| {
            TrackerError::Parse(format!("tracker '{}' has no scrape_url", self.config.name))
        })?;
        let url = self.render_url(template, torrent)?;
        let body = self.fetcher.request(&self.request(url)).await?;
        parse_scrape_response(&body)
    }
}

#[async_trait]
impl RemoteTimestamp for GenericTracker {
    async fn fetch_remote_timestamp(&self, torrent: &TorrentRecord) -> Result<i64, TrackerError> {
        let template = self.config.page_url.as_deref().ok_or_else(|| {
            TrackerError::Parse(format!("tracker '{}' has no page_url", self.config.name))
        })?;
        let pattern = self.timestamp_re.as_ref().ok_or_else(|| {
            TrackerError::Parse(format!(
                "tracker '{}' has no timestamp_pattern",
                self.config.name
            ))
        })?;

        let url = self.render_url(template, torrent)?;
        let page = self.fetcher.request(&self.request(url)).await?;
        let page = String::from_utf8_lossy(&page);

        let captured = pattern
            .captures(&page)
            .and_then(|c| c.get(1).or_else(|| c.get(0)))
            .ok_or_else(|| TrackerError::Parse("upload time not found on page".to_string()))?;

        parse_timestamp(captured.as_str(), &self.config.timestamp_format, self.offset).ok_or_else(
            || {
                TrackerError::Parse(format!(
                    "cannot parse '{}' with format '{}'",
                    captured.as_str(),
                    self.config.timestamp_format
                ))
            },
        )
    }
}

#[async_trait]
impl TrackerSession for GenericTracker {
    async fn test_connectivity(&self) -> Result<(), TrackerError> {
        if let Some(url) = &self.config.test_url {
            self.fetcher.request(&self.request(url.clone())).await?;
            debug!(tracker = %self.config.name, "Connectivity test passed");
        }
        Ok(())
    }

    async fn login(&self) -> Result<(), TrackerError> {
        let Some(login) = &self.config.login else {
            return Ok(());
        };

        let mut request = FetchRequest::post_form(
            login.url.clone(),
            login.form.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        );
        for (k, v) in &self.config.headers {
            request = request.with_header(k.clone(), v.clone());
        }

        let body = self.fetcher.request(&request).await?;
        if let Some(failure) = &self.login_failure_re {
            if failure.is_match(&String::from_utf8_lossy(&body)) {
                return Err(TrackerError::Auth(format!(
                    "login to '{}' rejected",
                    self.config.name
                )));
            }
        }
        info!(tracker = %self.config.name, "Logged in");
        Ok(())
    }
}

fn compile(tracker: &str, field: &str, pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| {
        ConfigError::ValidationError(format!("tracker '{}': invalid {}: {}", tracker, field, e))
    })
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// Parse a fixed UTC offset: `UTC`, `Z`, `+03:00`, `+0300`, `-5`.
pub(crate) fn parse_offset(value: &str) -> Option<FixedOffset> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("utc") || value.eq_ignore_ascii_case("z") {
        return Some(utc());
    }

    let (sign, rest) = match value.as_bytes().first()? {
        b'+' => (1, &value[1..]),
        b'-' => (-1, &value[1..]),
        _ => return None,
    };
    if !rest.bytes().all(|b| b.is_ascii_digit() || b == b':') {
        return None;
    }
    let (hours, minutes) = match rest.split_once(':') {
        Some((h, m)) => (h, m),
        None if rest.len() == 4 => rest.split_at(2),
        None => (rest, "0"),
    };
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Parse a page timestamp into epoch seconds.
///
/// Formats carrying an offset (`%z`, `%:z`) are taken at face value;
/// otherwise the value is interpreted in `offset`.
pub(crate) fn parse_timestamp(value: &str, format: &str, offset: FixedOffset) -> Option<i64> {
    let value = value.trim();
    if format.contains("%z") || format.contains("%:z") {
        return DateTime::parse_from_str(value, format)
            .ok()
            .map(|dt| dt.timestamp());
    }

    let naive = NaiveDateTime::parse_from_str(value, format).ok().or_else(|| {
        NaiveDate::parse_from_str(value, format)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
    })?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.timestamp())
}

/// A scrape response lists every registered hash under `files`; an empty
/// map means the tracker no longer knows the torrent.
pub(crate) fn parse_scrape_response(body: &[u8]) -> Result<bool, TrackerError> {
    let dict = decode(body).map_err(|e| TrackerError::Parse(format!("bad scrape response: {}", e)))?;

    if let Some(Value::Bytes(reason)) = dict.get(b"failure reason".as_slice()) {
        return Err(TrackerError::Parse(format!(
            "scrape failed: {}",
            String::from_utf8_lossy(reason)
        )));
    }

    match dict.get(b"files".as_slice()) {
        Some(Value::Dict(files)) => Ok(!files.is_empty()),
        _ => Err(TrackerError::Parse(
            "scrape response has no files dictionary".to_string(),
        )),
    }
}

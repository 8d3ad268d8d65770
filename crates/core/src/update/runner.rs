//! Per-torrent update state machine.
//!
//! Torrents are processed one at a time in name order. Each one ends in
//! exactly one [`Outcome`]; nothing that happens to one torrent aborts the
//! batch.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::collections::{BTreeMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anyhow::Context;
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::diff::diff;
use crate::progress::ProgressReporter;
use crate::torrent::{TorrentError, TorrentRecord};
use crate::torrent_client::{Customs, TorrentClient, TorrentClientError};
use crate::tracker::{StaleCheck, Tracker, TrackerError};

use super::replace::{replace_torrent, ClientContext};
use super::sidecar;
use super::types::{
    ErrorInfo, Outcome, TorrentResult, TorrentSummary, UpdateError, UpdateSummary,
};

/// Knobs for one run.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Classify only; never write files or touch the client.
    pub dry_run: bool,
    /// Fetch from the tracker even when it reports no change.
    pub force: bool,
    pub save_customs: Vec<String>,
    pub set_customs: Customs,
}

impl UpdateOptions {
    pub fn from_config(config: &Config) -> Self {
        let client = config.client.as_ref();
        Self {
            dry_run: config.core.dry_run,
            force: config.core.force,
            save_customs: client.map(|c| c.save_customs.clone()).unwrap_or_default(),
            set_customs: client.map(|c| c.set_customs.clone()).unwrap_or_default(),
        }
    }
}

/// Drives every torrent through match → check → fetch → replace.
pub struct Updater {
    trackers: Vec<Arc<dyn Tracker>>,
    client: Option<Arc<dyn TorrentClient>>,
    options: UpdateOptions,
}

impl Updater {
    pub fn new(
        trackers: Vec<Arc<dyn Tracker>>,
        client: Option<Arc<dyn TorrentClient>>,
        options: UpdateOptions,
    ) -> Self {
        Self {
            trackers,
            client,
            options,
        }
    }

    /// Process every torrent, keyed by file name.
    ///
    /// Fails only when the client's torrent list cannot be read.
    pub async fn run(
        &self,
        torrents: BTreeMap<String, Option<TorrentRecord>>,
        reporter: &mut dyn ProgressReporter,
    ) -> Result<UpdateSummary, UpdateError> {
        let client_hashes = match &self.client {
            Some(client) => Some(client.hashes().await.map_err(UpdateError::ClientHashes)?),
            None => None,
        };

        info!(
            torrents = torrents.len(),
            trackers = self.trackers.len(),
            dry_run = self.options.dry_run,
            force = self.options.force,
            "Starting update run"
        );

        let mut summary = UpdateSummary::default();
        for (name, mut record) in torrents {
            reporter.in_progress(&name);
            let result = self
                .process(&name, record.as_mut(), client_hashes.as_ref())
                .await;
            reporter.finished(&result);
            info!(torrent = %name, outcome = %result.outcome.kind(), "Processed torrent");
            summary.results.push(result);
        }

        reporter.finish(&summary);
        Ok(summary)
    }

    /// Resolve a single torrent to its outcome.
    pub async fn process(
        &self,
        name: &str,
        record: Option<&mut TorrentRecord>,
        client_hashes: Option<&HashSet<String>>,
    ) -> TorrentResult {
        let mut result = TorrentResult {
            name: name.to_string(),
            outcome: Outcome::Invalid,
            torrent: None,
            tracker: None,
        };

        let Some(record) = record else {
            return result;
        };
        let hash = match record.info_hash() {
            Ok(hash) => hash.to_string(),
            Err(e) => {
                warn!(torrent = %name, error = %e, "Cannot hash torrent");
                return result;
            }
        };
        result.torrent = TorrentSummary::of(record);

        if let Some(hashes) = client_hashes {
            if !hashes.contains(&hash) {
                result.outcome = Outcome::NotInClient;
                return result;
            }
        }

        let Some(tracker) = self.trackers.iter().find(|t| t.matches(record)) else {
            result.outcome = Outcome::Unknown;
            return result;
        };
        result.tracker = Some(tracker.name().to_string());
        debug!(torrent = %name, tracker = %tracker.name(), "Matched tracker");

        let resolved = AssertUnwindSafe(self.update(tracker.as_ref(), record, &hash))
            .catch_unwind()
            .await;

        result.outcome = match resolved {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => classify_error(name, err),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                let traceback = panic_traceback(name, tracker.name(), &message);
                error!(
                    torrent = %name,
                    panic = %message,
                    traceback = %traceback.join("\n"),
                    "Torrent processing panicked"
                );
                Outcome::UnhandledError {
                    error: ErrorInfo::new("Panic", message),
                    traceback,
                }
            }
        };
        result.torrent = TorrentSummary::of(record);
        result
    }

    async fn update(
        &self,
        tracker: &dyn Tracker,
        record: &mut TorrentRecord,
        local_hash: &str,
    ) -> anyhow::Result<Outcome> {
        let mut remote_time = None;

        let stale = match tracker.stale_check() {
            StaleCheck::Hash(check) => {
                let remote = check.fetch_remote_hash(record).await?;
                debug!(local = %local_hash, remote = %remote, "Compared info-hashes");
                !remote.eq_ignore_ascii_case(local_hash)
            }
            StaleCheck::Scrape(check) => {
                let scrape_hash = record.scrape_hash()?;
                !check.is_registered(record, &scrape_hash).await?
            }
            StaleCheck::Timestamp(check) => {
                let path = record
                    .path()
                    .context("timestamp check needs the torrent's file path")?
                    .to_path_buf();
                let local = sidecar::read_or_init_time(&path, !self.options.dry_run)
                    .await
                    .context("reading last known time")?;
                let remote = check.fetch_remote_timestamp(record).await?;
                debug!(local, remote, "Compared timestamps");
                remote_time = Some(remote);
                remote > local
            }
        };

        if !stale && !self.options.force {
            return Ok(Outcome::Passed);
        }

        let new_data = tracker.fetch_new_data(record).await?;
        let new_record = TorrentRecord::from_bytes(new_data.clone()).map_err(|e| {
            TrackerError::Parse(format!("downloaded data is not a torrent: {}", e))
        })?;

        if new_record.info_hash()? == local_hash && !self.options.force {
            debug!(hash = %local_hash, "Fetched torrent is unchanged");
            if let (Some(timestamp), false) = (remote_time, self.options.dry_run) {
                if let Some(path) = record.path() {
                    sidecar::write_time(path, timestamp)
                        .await
                        .context("writing .time sidecar")?;
                }
            }
            return Ok(Outcome::Passed);
        }

        let changes = diff(&record.manifest("")?, &new_record.manifest("")?);

        if !self.options.dry_run {
            let client = self.client.as_deref().map(|client| ClientContext {
                client,
                save_customs: &self.options.save_customs,
                set_customs: &self.options.set_customs,
            });
            replace_torrent(record, new_data, client, remote_time).await?;
        }

        Ok(Outcome::Affected { diff: changes })
    }
}

fn classify_error(name: &str, err: anyhow::Error) -> Outcome {
    if let Some(tracker_error) = err.downcast_ref::<TrackerError>() {
        warn!(torrent = %name, error = %tracker_error, "Tracker error");
        return Outcome::TrackerError(ErrorInfo::new(
            tracker_error.name(),
            tracker_error.to_string(),
        ));
    }

    let traceback = traceback(&err);
    error!(
        torrent = %name,
        error = %format!("{:#}", err),
        traceback = %traceback.join("\n"),
        "Unhandled error"
    );
    Outcome::UnhandledError {
        error: ErrorInfo::new(error_name(&err), format!("{:#}", err)),
        traceback,
    }
}

fn error_name(err: &anyhow::Error) -> &'static str {
    let root = err.root_cause();
    if root.is::<TorrentError>() {
        "TorrentError"
    } else if root.is::<TorrentClientError>() {
        "TorrentClientError"
    } else if root.is::<std::io::Error>() {
        "IoError"
    } else if root.is::<serde_json::Error>() {
        "JsonError"
    } else {
        "Error"
    }
}

/// Cause chain, outermost first, then the backtrace when one was captured.
fn traceback(err: &anyhow::Error) -> Vec<String> {
    let mut lines: Vec<String> = err.chain().map(|cause| cause.to_string()).collect();
    let backtrace = err.backtrace();
    if backtrace.status() == BacktraceStatus::Captured {
        lines.extend(backtrace.to_string().lines().map(str::to_string));
    }
    lines
}

/// Panic payload and the torrent it hit, then the catch-site backtrace when
/// capturing is enabled.
fn panic_traceback(name: &str, tracker: &str, message: &str) -> Vec<String> {
    let mut lines = vec![
        format!("panicked: {}", message),
        format!("while updating {} with tracker {}", name, tracker),
    ];
    let backtrace = Backtrace::capture();
    if backtrace.status() == BacktraceStatus::Captured {
        lines.extend(backtrace.to_string().lines().map(str::to_string));
    }
    lines
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

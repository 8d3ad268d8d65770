//! Types for the update state machine.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diff::Diff;
use crate::torrent::TorrentRecord;
use crate::torrent_client::TorrentClientError;

/// Errors that abort a whole run.
///
/// Per-torrent failures never surface here; they become outcomes.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("failed to list torrents in client: {0}")]
    ClientHashes(#[source] TorrentClientError),
}

/// A named error carried by an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub name: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Terminal result of processing one torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The file failed to decode or has no `info` dictionary.
    Invalid,
    /// A client is configured and does not have this torrent.
    NotInClient,
    /// No tracker claims this torrent.
    Unknown,
    /// The tracker reports no change.
    Passed,
    /// New metadata was fetched (and, outside dry runs, applied).
    Affected { diff: Diff },
    /// The tracker reported a domain error.
    TrackerError(ErrorInfo),
    /// Anything else went wrong, including panics.
    UnhandledError {
        error: ErrorInfo,
        traceback: Vec<String>,
    },
}

impl Outcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Invalid => OutcomeKind::Invalid,
            Outcome::NotInClient => OutcomeKind::NotInClient,
            Outcome::Unknown => OutcomeKind::Unknown,
            Outcome::Passed => OutcomeKind::Passed,
            Outcome::Affected { .. } => OutcomeKind::Affected,
            Outcome::TrackerError(_) => OutcomeKind::TrackerError,
            Outcome::UnhandledError { .. } => OutcomeKind::UnhandledError,
        }
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        match self {
            Outcome::TrackerError(error) | Outcome::UnhandledError { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Outcome tag without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Invalid,
    NotInClient,
    Unknown,
    Passed,
    Affected,
    TrackerError,
    UnhandledError,
}

impl OutcomeKind {
    /// Every tag, in display order.
    pub const ALL: [OutcomeKind; 7] = [
        OutcomeKind::Invalid,
        OutcomeKind::NotInClient,
        OutcomeKind::Unknown,
        OutcomeKind::Passed,
        OutcomeKind::Affected,
        OutcomeKind::TrackerError,
        OutcomeKind::UnhandledError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Invalid => "invalid",
            OutcomeKind::NotInClient => "not_in_client",
            OutcomeKind::Unknown => "unknown",
            OutcomeKind::Passed => "passed",
            OutcomeKind::Affected => "affected",
            OutcomeKind::TrackerError => "tracker_error",
            OutcomeKind::UnhandledError => "unhandled_error",
        }
    }
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a processed torrent, as exported in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TorrentSummary {
    pub hash: String,
    pub path: Option<PathBuf>,
    pub comment: Option<String>,
}

impl TorrentSummary {
    /// `None` when the record cannot be hashed.
    pub fn of(record: &TorrentRecord) -> Option<Self> {
        Some(Self {
            hash: record.info_hash().ok()?.to_string(),
            path: record.path().map(|p| p.to_path_buf()),
            comment: record.comment(),
        })
    }
}

/// Result for one torrent.
#[derive(Debug, Clone)]
pub struct TorrentResult {
    /// File name the torrent was loaded from.
    pub name: String,
    pub outcome: Outcome,
    pub torrent: Option<TorrentSummary>,
    /// Name of the tracker that claimed the torrent.
    pub tracker: Option<String>,
}

/// All results of a run, in processing order.
#[derive(Debug, Clone, Default)]
pub struct UpdateSummary {
    pub results: Vec<TorrentResult>,
}

impl UpdateSummary {
    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome.kind() == kind)
            .count()
    }

    /// Per-tag counts, including zeroes.
    pub fn counts(&self) -> BTreeMap<OutcomeKind, usize> {
        OutcomeKind::ALL
            .iter()
            .map(|kind| (*kind, self.count(*kind)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

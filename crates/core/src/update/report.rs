//! JSON export of a run, keyed by torrent file name.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::diff::Diff;

use super::sidecar::write_durable;
use super::types::{ErrorInfo, Outcome, OutcomeKind, TorrentSummary, UpdateSummary};

/// Change counts of an affected torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffStat {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
    pub type_modified: usize,
}

impl From<&Diff> for DiffStat {
    fn from(diff: &Diff) -> Self {
        Self {
            added: diff.added.len(),
            removed: diff.removed.len(),
            modified: diff.modified.len(),
            type_modified: diff.type_modified.len(),
        }
    }
}

/// One torrent's report entry.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub status: OutcomeKind,
    pub torrent: Option<TorrentSummary>,
    pub tracker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stat: Option<DiffStat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diff: Option<Diff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub traceback: Vec<String>,
}

pub fn build_report(summary: &UpdateSummary) -> BTreeMap<String, ReportEntry> {
    summary
        .results
        .iter()
        .map(|result| {
            let (diff, traceback) = match &result.outcome {
                Outcome::Affected { diff } => (Some(diff.clone()), Vec::new()),
                Outcome::UnhandledError { traceback, .. } => (None, traceback.clone()),
                _ => (None, Vec::new()),
            };
            let entry = ReportEntry {
                status: result.outcome.kind(),
                torrent: result.torrent.clone(),
                tracker: result.tracker.clone(),
                stat: diff.as_ref().map(DiffStat::from),
                diff,
                error: result.outcome.error().cloned(),
                traceback,
            };
            (result.name.clone(), entry)
        })
        .collect()
}

pub async fn write_report(path: &Path, summary: &UpdateSummary) -> io::Result<()> {
    let json = serde_json::to_vec_pretty(&build_report(summary)).map_err(io::Error::other)?;
    write_durable(path, &json).await?;
    info!(path = %path.display(), entries = summary.len(), "Wrote report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::update::TorrentResult;
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn summary() -> UpdateSummary {
        let mut diff = Diff::default();
        diff.added.insert("a/y".to_string());
        diff.modified.insert("a/x".to_string());

        UpdateSummary {
            results: vec![
                TorrentResult {
                    name: "a.torrent".to_string(),
                    outcome: Outcome::Affected { diff },
                    torrent: Some(TorrentSummary {
                        hash: "ab".repeat(20),
                        path: Some(PathBuf::from("/t/a.torrent")),
                        comment: Some("https://site/1".to_string()),
                    }),
                    tracker: Some("site".to_string()),
                },
                TorrentResult {
                    name: "b.torrent".to_string(),
                    outcome: Outcome::Invalid,
                    torrent: None,
                    tracker: None,
                },
                TorrentResult {
                    name: "c.torrent".to_string(),
                    outcome: Outcome::UnhandledError {
                        error: ErrorInfo::new("IoError", "disk full"),
                        traceback: vec!["disk full".to_string()],
                    },
                    torrent: None,
                    tracker: Some("site".to_string()),
                },
            ],
        }
    }

    #[test]
    fn test_build_report_shape() {
        let report = serde_json::to_value(build_report(&summary())).unwrap();
        assert_eq!(
            report["a.torrent"],
            json!({
                "status": "affected",
                "torrent": {
                    "hash": "ab".repeat(20),
                    "path": "/t/a.torrent",
                    "comment": "https://site/1"
                },
                "tracker": "site",
                "stat": {"added": 1, "removed": 0, "modified": 1, "type_modified": 0},
                "diff": {
                    "added": ["a/y"],
                    "removed": [],
                    "modified": ["a/x"],
                    "type_modified": []
                }
            })
        );
        assert_eq!(
            report["b.torrent"],
            json!({"status": "invalid", "torrent": null, "tracker": null})
        );
        assert_eq!(report["c.torrent"]["error"]["name"], "IoError");
        assert_eq!(report["c.torrent"]["traceback"], json!(["disk full"]));
    }

    #[tokio::test]
    async fn test_write_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        write_report(&path, &summary()).await.unwrap();

        let parsed: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(parsed.as_object().unwrap().len(), 3);
        assert_eq!(parsed["c.torrent"]["status"], "unhandled_error");
    }
}

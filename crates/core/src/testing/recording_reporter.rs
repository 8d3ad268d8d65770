//! Progress reporter that records every notification.

use crate::progress::ProgressReporter;
use crate::update::{OutcomeKind, TorrentResult, UpdateSummary};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReporterEvent {
    InProgress(String),
    Finished(String, OutcomeKind),
    Finish(usize),
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub events: Vec<ReporterEvent>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Outcome tags in the order torrents finished.
    pub fn outcomes(&self) -> Vec<(String, OutcomeKind)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                ReporterEvent::Finished(name, kind) => Some((name.clone(), *kind)),
                _ => None,
            })
            .collect()
    }
}

impl ProgressReporter for RecordingReporter {
    fn in_progress(&mut self, name: &str) {
        self.events.push(ReporterEvent::InProgress(name.to_string()));
    }

    fn finished(&mut self, result: &TorrentResult) {
        self.events.push(ReporterEvent::Finished(
            result.name.clone(),
            result.outcome.kind(),
        ));
    }

    fn finish(&mut self, summary: &UpdateSummary) {
        self.events.push(ReporterEvent::Finish(summary.len()));
    }
}

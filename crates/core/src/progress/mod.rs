//! Progress reporting for a batch run.
//!
//! The updater calls [`ProgressReporter::in_progress`] before each torrent
//! and [`ProgressReporter::finished`] exactly once after it, then
//! [`ProgressReporter::finish`] at the end of the batch.

mod line;
mod spinner;
mod terminal;

pub use line::{LogWriter, ProgressLine};
pub use spinner::Spinner;
pub use terminal::TerminalReporter;

use crate::update::{TorrentResult, UpdateSummary};

pub trait ProgressReporter: Send {
    fn in_progress(&mut self, name: &str);

    fn finished(&mut self, result: &TorrentResult);

    /// Flush any open line and print the batch summary.
    fn finish(&mut self, summary: &UpdateSummary);
}

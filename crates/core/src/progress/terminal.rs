//! Line-oriented terminal reporter.

use std::io::Write;

use crate::update::{Outcome, OutcomeKind, TorrentResult, UpdateSummary};

use super::{ProgressLine, ProgressReporter, Spinner};

/// Writes one line per torrent to `out`.
///
/// While a torrent is in progress either a spinner runs on stdout or a
/// partial line is left open on `out`; both are closed before the outcome
/// line is written. Either one is registered on the reporter's
/// [`ProgressLine`].
pub struct TerminalReporter<W: Write + Send> {
    out: W,
    show_diff: bool,
    use_spinner: bool,
    spinner: Option<Spinner>,
    line: ProgressLine,
    line_open: bool,
}

impl TerminalReporter<std::io::Stdout> {
    pub fn stdout(show_diff: bool, use_spinner: bool) -> Self {
        Self::new(std::io::stdout(), show_diff, use_spinner)
    }
}

impl<W: Write + Send> TerminalReporter<W> {
    pub fn new(out: W, show_diff: bool, use_spinner: bool) -> Self {
        Self {
            out,
            show_diff,
            use_spinner,
            spinner: None,
            line: ProgressLine::new(),
            line_open: false,
        }
    }

    /// Share the progress line with the log writer.
    pub fn with_line(mut self, line: ProgressLine) -> Self {
        self.line = line;
        self
    }

    pub fn into_inner(mut self) -> W {
        self.close_progress();
        self.out
    }

    fn close_progress(&mut self) {
        if let Some(mut spinner) = self.spinner.take() {
            spinner.stop();
        }
        if self.line_open {
            let _ = write!(self.out, "\r");
            self.line.release();
            self.line_open = false;
        }
    }

    fn write_result(&mut self, result: &TorrentResult) -> std::io::Result<()> {
        let kind = result.outcome.kind();
        write!(self.out, "{:<15} {}", kind.as_str(), result.name)?;
        if let Some(tracker) = &result.tracker {
            write!(self.out, " [{}]", tracker)?;
        }
        if let Some(error) = result.outcome.error() {
            write!(self.out, ": {}: {}", error.name, error.message)?;
        }
        writeln!(self.out)?;

        if let Outcome::Affected { diff } = &result.outcome {
            if self.show_diff {
                for line in diff.render_lines() {
                    writeln!(self.out, "    {}", line)?;
                }
            }
        }
        self.out.flush()
    }

    fn write_summary(&mut self, summary: &UpdateSummary) -> std::io::Result<()> {
        writeln!(self.out, "Processed {} torrent(s):", summary.len())?;
        for kind in OutcomeKind::ALL {
            writeln!(self.out, "  {:<15} {}", kind.as_str(), summary.count(kind))?;
        }
        self.out.flush()
    }
}

impl<W: Write + Send> ProgressReporter for TerminalReporter<W> {
    fn in_progress(&mut self, name: &str) {
        self.close_progress();
        if self.use_spinner {
            self.spinner = Some(Spinner::start(name, self.line.clone()));
        } else {
            let _ = write!(self.out, "{} ...", name);
            let _ = self.out.flush();
            self.line.mark_drawn();
            self.line_open = true;
        }
    }

    fn finished(&mut self, result: &TorrentResult) {
        self.close_progress();
        let _ = self.write_result(result);
    }

    fn finish(&mut self, summary: &UpdateSummary) {
        self.close_progress();
        let _ = self.write_summary(summary);
    }
}

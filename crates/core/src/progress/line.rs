//! The partially drawn progress line, shared with log output.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing_subscriber::fmt::MakeWriter;

const CLEAR_LINE: &[u8] = b"\r\x1b[2K";

/// Tracks whether stdout currently ends in an unterminated progress line.
///
/// The spinner draws through it. Installed as the `tracing_subscriber` fmt
/// writer, it erases that line before every log event and holds it until
/// the event is written, so a redraw never lands inside a log line.
#[derive(Clone, Default)]
pub struct ProgressLine {
    drawn: Arc<Mutex<bool>>,
}

impl ProgressLine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.drawn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Overwrite the line with `text`.
    pub fn draw(&self, out: &mut impl Write, text: &str) -> io::Result<()> {
        let mut drawn = self.lock();
        write!(out, "\r{}", text)?;
        out.flush()?;
        *drawn = true;
        Ok(())
    }

    /// Record that text was left on the line by another writer.
    pub fn mark_drawn(&self) {
        *self.lock() = true;
    }

    /// Forget the line once its owner has overwritten it.
    pub fn release(&self) {
        *self.lock() = false;
    }

    /// Erase the line if anything is drawn on it.
    pub fn clear(&self, out: &mut impl Write) -> io::Result<()> {
        clear_drawn(&mut self.lock(), out)
    }

    pub fn is_drawn(&self) -> bool {
        *self.lock()
    }
}

fn clear_drawn(drawn: &mut bool, out: &mut impl Write) -> io::Result<()> {
    if *drawn {
        out.write_all(CLEAR_LINE)?;
        out.flush()?;
        *drawn = false;
    }
    Ok(())
}

/// Writes one log event to stderr while holding the progress line.
pub struct LogWriter<'a> {
    _line: MutexGuard<'a, bool>,
    stderr: io::Stderr,
}

impl<'a> MakeWriter<'a> for ProgressLine {
    type Writer = LogWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        let mut drawn = self.lock();
        let _ = clear_drawn(&mut drawn, &mut io::stdout());
        LogWriter {
            _line: drawn,
            stderr: io::stderr(),
        }
    }
}

impl Write for LogWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stderr.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stderr.flush()
    }
}

//! Background spinner animating a single terminal line.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::ProgressLine;

const FRAMES: &[char] = &['|', '/', '-', '\\'];
const TICK: Duration = Duration::from_millis(100);

/// Redraws `label` with a rotating frame on stdout until stopped.
///
/// Every frame goes through the shared [`ProgressLine`].
pub struct Spinner {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Spinner {
    pub fn start(label: &str, line: ProgressLine) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let label = label.to_string();

        let handle = thread::spawn(move || {
            let mut stdout = std::io::stdout();
            let mut frame = 0;
            while !flag.load(Ordering::SeqCst) {
                let text = format!("{} {}", label, FRAMES[frame % FRAMES.len()]);
                let _ = line.draw(&mut stdout, &text);
                frame += 1;
                thread::sleep(TICK);
            }
            let _ = line.clear(&mut stdout);
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    /// Signal the thread and wait until it has cleared its line.
    pub fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Update engine: per-torrent state machine, crash-safe replace protocol,
//! sidecar files, directory lock and report export.

mod lock;
mod replace;
mod report;
mod runner;
pub mod sidecar;
mod types;

pub use lock::{DirLock, LockError, LOCK_FILE_NAME};
pub use replace::{replace_torrent, resolve_custom_value, ClientContext, DEFAULT_NOW_FORMAT};
pub use report::{build_report, write_report, DiffStat, ReportEntry};
pub use runner::{UpdateOptions, Updater};
pub use sidecar::find_partial_updates;
pub use types::*;

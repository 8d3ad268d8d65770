pub mod config;
pub mod diff;
pub mod fetch;
pub mod progress;
pub mod testing;
pub mod torrent;
pub mod torrent_client;
pub mod tracker;
pub mod update;

pub use config::{load_config, load_config_from_str, validate_config, Config, ConfigError};
pub use diff::{diff, Diff};
pub use fetch::{Fetcher, HttpOpener, RetryPolicy};
pub use progress::{ProgressLine, ProgressReporter, TerminalReporter};
pub use torrent::{load_directory, TorrentError, TorrentRecord};
pub use torrent_client::{build_client, TorrentClient, TorrentClientError};
pub use tracker::{build_trackers, Tracker, TrackerError};
pub use update::{
    find_partial_updates, write_report, DirLock, Outcome, OutcomeKind, UpdateOptions,
    UpdateSummary, Updater,
};

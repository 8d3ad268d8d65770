//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the plugin traits, allowing
//! the update engine to be exercised without a network or a real client.
//!
//! # Example
//!
//! ```rust,ignore
//! use refresher_core::config::CheckKind;
//! use refresher_core::testing::{fixtures, MockTorrentClient, MockTracker, RecordingReporter};
//!
//! let client = MockTorrentClient::new();
//! let tracker = MockTracker::new("site", "https://site/", CheckKind::Hash)
//!     .with_new_data(fixtures::single_file_torrent("a", 20, Some("https://site/1")));
//! let mut reporter = RecordingReporter::new();
//! ```

mod mock_opener;
mod mock_torrent_client;
mod mock_tracker;
mod recording_reporter;

pub use mock_opener::MockOpener;
pub use mock_torrent_client::{ClientCall, MockTorrentClient};
pub use mock_tracker::{MockFailure, MockTracker};
pub use recording_reporter::{RecordingReporter, ReporterEvent};

/// Bencoded torrent fixtures.
pub mod fixtures {
    use std::collections::HashMap;

    use serde_bencode::value::Value;

    const PIECE_LENGTH: i64 = 16384;

    fn text(s: &str) -> Value {
        Value::Bytes(s.as_bytes().to_vec())
    }

    fn dict(entries: Vec<(&str, Value)>) -> Value {
        Value::Dict(
            entries
                .into_iter()
                .map(|(k, v)| (k.as_bytes().to_vec(), v))
                .collect(),
        )
    }

    fn to_bytes(value: &Value) -> Vec<u8> {
        serde_bencode::to_bytes(value).expect("fixture encodes")
    }

    fn from_bytes(bytes: &[u8]) -> HashMap<Vec<u8>, Value> {
        match serde_bencode::from_bytes(bytes).expect("fixture decodes") {
            Value::Dict(d) => d,
            _ => panic!("fixture is not a dictionary"),
        }
    }

    fn torrent(info: Value, comment: Option<&str>) -> Vec<u8> {
        let mut root = vec![
            ("info", info),
            ("created by", text("fixtures")),
        ];
        if let Some(comment) = comment {
            root.push(("comment", text(comment)));
        }
        to_bytes(&dict(root))
    }

    /// A single-file torrent with one dummy piece hash.
    pub fn single_file_torrent(name: &str, length: u64, comment: Option<&str>) -> Vec<u8> {
        let info = dict(vec![
            ("name", text(name)),
            ("length", Value::Int(length as i64)),
            ("piece length", Value::Int(PIECE_LENGTH)),
            ("pieces", Value::Bytes(vec![0; 20])),
        ]);
        torrent(info, comment)
    }

    /// A multi-file torrent; paths are `/`-separated below the root `name`.
    pub fn multi_file_torrent(name: &str, files: &[(&str, u64)], comment: Option<&str>) -> Vec<u8> {
        let files = files
            .iter()
            .map(|(path, length)| {
                dict(vec![
                    ("length", Value::Int(*length as i64)),
                    ("path", Value::List(path.split('/').map(text).collect())),
                ])
            })
            .collect();
        let info = dict(vec![
            ("name", text(name)),
            ("files", Value::List(files)),
            ("piece length", Value::Int(PIECE_LENGTH)),
            ("pieces", Value::Bytes(vec![0; 20])),
        ]);
        torrent(info, comment)
    }

    /// Add an `announce` key without touching `info`.
    pub fn with_announce(bytes: &[u8], announce: &str) -> Vec<u8> {
        let mut root = from_bytes(bytes);
        root.insert(b"announce".to_vec(), text(announce));
        to_bytes(&Value::Dict(root))
    }

    /// Add `announce` and a tiered `announce-list`.
    pub fn with_announce_list(bytes: &[u8], announce: &str, tiers: &[Vec<&str>]) -> Vec<u8> {
        let mut root = from_bytes(&with_announce(bytes, announce));
        let tiers = tiers
            .iter()
            .map(|tier| Value::List(tier.iter().map(|url| text(url)).collect()))
            .collect();
        root.insert(b"announce-list".to_vec(), Value::List(tiers));
        to_bytes(&Value::Dict(root))
    }

    /// Same torrent with a different comment.
    pub fn with_comment(bytes: &[u8], comment: &str) -> Vec<u8> {
        let mut root = from_bytes(bytes);
        root.insert(b"comment".to_vec(), text(comment));
        to_bytes(&Value::Dict(root))
    }
}

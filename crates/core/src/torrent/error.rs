//! Error types for torrent metadata handling.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while decoding or inspecting torrent metadata.
#[derive(Debug, Error)]
pub enum TorrentError {
    /// The byte stream is not valid bencode.
    #[error("Invalid bencode: {0}")]
    InvalidFormat(String),

    /// Top-level value decoded fine but is not a dictionary.
    #[error("Top-level bencoded value is not a dictionary")]
    NotADictionary,

    /// The `info` key is missing or is not a dictionary.
    #[error("Missing or malformed info dictionary")]
    MissingInfo,

    /// A field required by the operation has the wrong shape.
    #[error("Malformed field '{field}': {reason}")]
    MalformedField { field: String, reason: String },

    /// Re-encoding a decoded tree failed.
    #[error("Failed to encode bencode: {0}")]
    Encode(String),

    /// An info-hash string is not 40 hex characters.
    #[error("Invalid info hash: {0}")]
    InvalidHash(String),

    /// Reading a torrent file failed.
    #[error("Failed to read torrent file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TorrentError {
    pub(crate) fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        TorrentError::MalformedField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

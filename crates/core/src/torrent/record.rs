//! In-memory view of one on-disk `.torrent` file.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;

use super::codec::{self, get_bytes, Dict};
use super::magnet::{self, MagnetField};
use super::manifest::{self, declared_encoding, FileManifest};
use super::text::decode_text;
use super::TorrentError;

/// A loaded torrent file.
///
/// The info-hash is computed on first use and cached until the bytes change.
#[derive(Debug)]
pub struct TorrentRecord {
    path: Option<PathBuf>,
    raw: Vec<u8>,
    decoded: Dict,
    info_hash: OnceCell<String>,
}

impl TorrentRecord {
    /// Parse a torrent from raw bytes.
    ///
    /// Rejects anything that is not a dictionary with an `info` dictionary.
    pub fn from_bytes(raw: Vec<u8>) -> Result<Self, TorrentError> {
        let decoded = codec::decode(&raw)?;
        codec::info_dict(&decoded)?;
        Ok(Self {
            path: None,
            raw,
            decoded,
            info_hash: OnceCell::new(),
        })
    }

    /// Load a torrent from disk.
    pub async fn load(path: &Path) -> Result<Self, TorrentError> {
        let raw = tokio::fs::read(path).await.map_err(|source| TorrentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut record = Self::from_bytes(raw)?;
        record.path = Some(path.to_path_buf());
        Ok(record)
    }

    /// Attach a filesystem location.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn decoded(&self) -> &Dict {
        &self.decoded
    }

    /// Lowercase hex SHA-1 of the `info` subtree.
    pub fn info_hash(&self) -> Result<&str, TorrentError> {
        self.info_hash
            .get_or_try_init(|| codec::info_hash(&self.decoded))
            .map(String::as_str)
    }

    /// Percent-encoded info-hash for scrape URLs.
    pub fn scrape_hash(&self) -> Result<String, TorrentError> {
        codec::scrape_hash(self.info_hash()?)
    }

    /// Display name of the torrent.
    pub fn name(&self) -> Result<String, TorrentError> {
        manifest::torrent_name(&self.decoded)
    }

    /// The `comment` field, decoded for display.
    pub fn comment(&self) -> Option<String> {
        if let Some(comment) = get_bytes(&self.decoded, "comment.utf-8") {
            return Some(String::from_utf8_lossy(comment).into_owned());
        }
        get_bytes(&self.decoded, "comment")
            .map(|c| decode_text(c, declared_encoding(&self.decoded).as_deref()))
    }

    pub fn manifest(&self, prefix: &str) -> Result<FileManifest, TorrentError> {
        manifest::manifest(&self.decoded, prefix)
    }

    pub fn total_size(&self) -> Result<u64, TorrentError> {
        manifest::total_size(&self.decoded)
    }

    pub fn announce_urls(&self) -> Vec<String> {
        magnet::announce_urls(&self.decoded)
    }

    pub fn magnet(&self, fields: &[MagnetField]) -> Result<String, TorrentError> {
        magnet::magnet_uri(&self.decoded, fields)
    }

    /// Swap in new content, keeping the path. The cached hash is dropped.
    pub fn replace_bytes(&mut self, raw: Vec<u8>) -> Result<(), TorrentError> {
        let decoded = codec::decode(&raw)?;
        codec::info_dict(&decoded)?;
        self.raw = raw;
        self.decoded = decoded;
        self.info_hash = OnceCell::new();
        Ok(())
    }
}

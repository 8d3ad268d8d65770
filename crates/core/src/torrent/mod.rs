//! Torrent metadata model.
//!
//! Decoding, info-hash computation, file manifests and magnet links for
//! `.torrent` files, plus directory loading.

mod codec;
mod error;
mod loader;
mod magnet;
mod manifest;
mod record;
mod text;

pub use codec::{decode, encode, info_dict, info_hash, info_hash_bytes, scrape_hash, Dict};
pub use error::TorrentError;
pub use loader::{load_directory, TORRENT_EXTENSION};
pub use magnet::{announce_urls, magnet_uri, MagnetField};
pub use manifest::{manifest, total_size, FileAttrs, FileManifest};
pub use record::TorrentRecord;
pub use text::decode_text;

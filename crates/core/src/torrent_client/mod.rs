//! Torrent client abstraction.
//!
//! This module provides a `TorrentClient` trait for the download client that
//! seeds the torrents being refreshed. Backends are picked by name from
//! [`registry::CLIENT_PLUGINS`].

mod qbittorrent;
pub mod registry;
mod types;

pub use qbittorrent::QBittorrentClient;
pub use registry::{build_client, check_custom_keys, is_known_client_backend};
pub use types::*;

//! Magnet URI construction.

use data_encoding::BASE32;
use serde::{Deserialize, Serialize};
use serde_bencode::value::Value;

use super::codec::{get_bytes, get_list, info_hash_bytes, Dict};
use super::manifest::{torrent_name, total_size};
use super::TorrentError;

/// Optional parameters appended to a magnet URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagnetField {
    /// `dn=` display name.
    Name,
    /// `tr=` one per unique announce URL.
    Trackers,
    /// `xl=` total size in bytes.
    Size,
}

/// Build `magnet:?xt=urn:btih:<base32 hash>` plus the requested fields.
pub fn magnet_uri(decoded: &Dict, fields: &[MagnetField]) -> Result<String, TorrentError> {
    let hash = BASE32.encode(&info_hash_bytes(decoded)?);
    let mut uri = format!("magnet:?xt=urn:btih:{}", hash);

    if fields.contains(&MagnetField::Name) {
        uri.push_str("&dn=");
        uri.push_str(&urlencoding::encode(&torrent_name(decoded)?));
    }
    if fields.contains(&MagnetField::Trackers) {
        for announce in announce_urls(decoded) {
            uri.push_str("&tr=");
            uri.push_str(&urlencoding::encode(&announce));
        }
    }
    if fields.contains(&MagnetField::Size) {
        uri.push_str(&format!("&xl={}", total_size(decoded)?));
    }

    Ok(uri)
}

/// All announce URLs from `announce` and `announce-list`, flattened and
/// deduplicated in first-seen order.
pub fn announce_urls(decoded: &Dict) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    let mut push = |bytes: &[u8]| {
        let url = String::from_utf8_lossy(bytes).trim().to_string();
        if !url.is_empty() && !urls.contains(&url) {
            urls.push(url);
        }
    };

    if let Some(announce) = get_bytes(decoded, "announce") {
        push(announce);
    }
    for tier in get_list(decoded, "announce-list").unwrap_or_default() {
        match tier {
            Value::List(tier) => {
                for url in tier {
                    if let Value::Bytes(url) = url {
                        push(url);
                    }
                }
            }
            Value::Bytes(url) => push(url),
            _ => {}
        }
    }

    urls
}

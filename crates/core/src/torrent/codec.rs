//! Bencode decoding/encoding and info-hash computation.
//!
//! Decoding goes through `serde_bencode`'s generic [`Value`] tree so that every
//! key of the original file survives a decode/encode cycle. Encoding always
//! emits dictionary keys in sorted order, which makes the info-hash a pure
//! function of the `info` subtree.

use std::collections::HashMap;

use serde_bencode::value::Value;
use sha1::{Digest, Sha1};

use super::TorrentError;

/// A decoded bencode dictionary.
pub type Dict = HashMap<Vec<u8>, Value>;

/// Decode a `.torrent` byte stream.
///
/// Fails unless the top-level value is a dictionary.
pub fn decode(bytes: &[u8]) -> Result<Dict, TorrentError> {
    let value: Value =
        serde_bencode::from_bytes(bytes).map_err(|e| TorrentError::InvalidFormat(e.to_string()))?;

    match value {
        Value::Dict(dict) => Ok(dict),
        _ => Err(TorrentError::NotADictionary),
    }
}

/// Encode a value with deterministic key order.
pub fn encode(value: &Value) -> Result<Vec<u8>, TorrentError> {
    serde_bencode::to_bytes(value).map_err(|e| TorrentError::Encode(e.to_string()))
}

/// Return the `info` dictionary of a decoded torrent.
pub fn info_dict(decoded: &Dict) -> Result<&Dict, TorrentError> {
    match decoded.get(b"info".as_slice()) {
        Some(Value::Dict(info)) => Ok(info),
        _ => Err(TorrentError::MissingInfo),
    }
}

/// SHA-1 digest of the re-serialized `info` subtree.
pub fn info_hash_bytes(decoded: &Dict) -> Result<[u8; 20], TorrentError> {
    let info = info_dict(decoded)?;
    let encoded = encode(&Value::Dict(info.clone()))?;
    let digest = Sha1::digest(&encoded);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    Ok(out)
}

/// Lowercase hex info-hash of a decoded torrent.
pub fn info_hash(decoded: &Dict) -> Result<String, TorrentError> {
    info_hash_bytes(decoded).map(hex::encode)
}

/// Percent-encode every byte of a hex info-hash (`%ab%cd...`), as used by
/// tracker scrape URLs.
pub fn scrape_hash(info_hash: &str) -> Result<String, TorrentError> {
    let raw = hex::decode(info_hash).map_err(|_| TorrentError::InvalidHash(info_hash.to_string()))?;
    if raw.len() != 20 {
        return Err(TorrentError::InvalidHash(info_hash.to_string()));
    }
    Ok(raw.iter().map(|b| format!("%{:02x}", b)).collect())
}

pub(crate) fn get_bytes<'a>(dict: &'a Dict, key: &str) -> Option<&'a [u8]> {
    match dict.get(key.as_bytes()) {
        Some(Value::Bytes(bytes)) => Some(bytes.as_slice()),
        _ => None,
    }
}

pub(crate) fn get_int(dict: &Dict, key: &str) -> Option<i64> {
    match dict.get(key.as_bytes()) {
        Some(Value::Int(n)) => Some(*n),
        _ => None,
    }
}

pub(crate) fn get_list<'a>(dict: &'a Dict, key: &str) -> Option<&'a [Value]> {
    match dict.get(key.as_bytes()) {
        Some(Value::List(list)) => Some(list.as_slice()),
        _ => None,
    }
}

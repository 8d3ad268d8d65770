//! File manifest extraction.
//!
//! A manifest maps normalized relative paths to either a directory marker
//! (`None`) or file attributes. Every path is rooted at `prefix/name`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_bencode::value::Value;

use super::codec::{get_bytes, get_int, get_list, info_dict, Dict};
use super::text::decode_text;
use super::TorrentError;

/// Attributes of a file entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttrs {
    pub size: u64,
}

/// Path → directory marker (`None`) or file attributes.
pub type FileManifest = BTreeMap<String, Option<FileAttrs>>;

/// Declared text encoding of a torrent, if any.
pub(crate) fn declared_encoding(decoded: &Dict) -> Option<String> {
    get_bytes(decoded, "encoding").map(|b| String::from_utf8_lossy(b).into_owned())
}

/// Display name of the torrent, preferring `name.utf-8`.
pub(crate) fn torrent_name(decoded: &Dict) -> Result<String, TorrentError> {
    let info = info_dict(decoded)?;
    if let Some(name) = get_bytes(info, "name.utf-8") {
        return Ok(String::from_utf8_lossy(name).into_owned());
    }
    let name = get_bytes(info, "name").ok_or_else(|| TorrentError::malformed("info.name", "missing"))?;
    Ok(decode_text(name, declared_encoding(decoded).as_deref()))
}

/// Build the file manifest of a decoded torrent.
///
/// Single-file torrents yield one entry. Multi-file torrents yield one
/// directory marker per directory level (including the root) plus one entry
/// per file.
pub fn manifest(decoded: &Dict, prefix: &str) -> Result<FileManifest, TorrentError> {
    let info = info_dict(decoded)?;
    let encoding = declared_encoding(decoded);
    let root = join_path(prefix, &normalize_component(&torrent_name(decoded)?));

    let mut result = FileManifest::new();

    match get_list(info, "files") {
        Some(files) => {
            result.insert(root.clone(), None);
            for (idx, file) in files.iter().enumerate() {
                let Value::Dict(file) = file else {
                    return Err(TorrentError::malformed(
                        format!("info.files[{}]", idx),
                        "not a dictionary",
                    ));
                };
                let size = file_length(file, &format!("info.files[{}].length", idx))?;
                let components = path_components(file, encoding.as_deref(), idx)?;

                let mut current = root.clone();
                let last = components.len().saturating_sub(1);
                for (pos, component) in components.iter().enumerate() {
                    current = join_path(&current, component);
                    if pos == last {
                        result.insert(current.clone(), Some(FileAttrs { size }));
                    } else {
                        result.entry(current.clone()).or_insert(None);
                    }
                }
            }
        }
        None => {
            let size = file_length(info, "info.length")?;
            result.insert(root, Some(FileAttrs { size }));
        }
    }

    Ok(result)
}

/// Sum of all file sizes listed in the torrent.
pub fn total_size(decoded: &Dict) -> Result<u64, TorrentError> {
    Ok(manifest(decoded, "")?
        .values()
        .flatten()
        .map(|attrs| attrs.size)
        .sum())
}

fn file_length(dict: &Dict, field: &str) -> Result<u64, TorrentError> {
    let length = get_int(dict, "length").ok_or_else(|| TorrentError::malformed(field, "missing"))?;
    u64::try_from(length).map_err(|_| TorrentError::malformed(field, "negative length"))
}

fn path_components(
    file: &Dict,
    encoding: Option<&str>,
    idx: usize,
) -> Result<Vec<String>, TorrentError> {
    let (parts, utf8) = match get_list(file, "path.utf-8") {
        Some(parts) => (parts, true),
        None => (
            get_list(file, "path").ok_or_else(|| {
                TorrentError::malformed(format!("info.files[{}].path", idx), "missing")
            })?,
            false,
        ),
    };

    let mut components = Vec::with_capacity(parts.len());
    for part in parts {
        let Value::Bytes(bytes) = part else {
            return Err(TorrentError::malformed(
                format!("info.files[{}].path", idx),
                "component is not a string",
            ));
        };
        let text = if utf8 {
            String::from_utf8_lossy(bytes).into_owned()
        } else {
            decode_text(bytes, encoding)
        };
        let component = normalize_component(&text);
        if !component.is_empty() {
            components.push(component);
        }
    }

    if components.is_empty() {
        return Err(TorrentError::malformed(
            format!("info.files[{}].path", idx),
            "empty path",
        ));
    }
    Ok(components)
}

fn normalize_component(component: &str) -> String {
    let trimmed = component.trim_matches('/');
    if trimmed == "." || trimmed == ".." {
        String::new()
    } else {
        trimmed.replace('/', "_")
    }
}

fn join_path(base: &str, component: &str) -> String {
    let base = base.trim_end_matches('/');
    if base.is_empty() {
        component.to_string()
    } else {
        format!("{}/{}", base, component)
    }
}

//! Loading a directory of torrent files.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, warn};

use super::TorrentRecord;

/// File extension of torrent files picked up by [`load_directory`].
pub const TORRENT_EXTENSION: &str = "torrent";

/// Load every `*.torrent` file in `dir` (non-recursive).
///
/// Keys are file names. Files that fail to decode map to `None` so the caller
/// can report them as invalid without aborting.
pub async fn load_directory(
    dir: &Path,
) -> Result<BTreeMap<String, Option<TorrentRecord>>, std::io::Error> {
    let mut torrents = BTreeMap::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(TORRENT_EXTENSION) {
            continue;
        }
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();

        match TorrentRecord::load(&path).await {
            Ok(record) => {
                debug!(torrent = %name, "Loaded torrent");
                torrents.insert(name, Some(record));
            }
            Err(e) => {
                warn!(torrent = %name, error = %e, "Failed to load torrent");
                torrents.insert(name, None);
            }
        }
    }

    Ok(torrents)
}

//! Recovery files stored next to a torrent.
//!
//! Given a torrent at `P`:
//! - `P.newdata` holds freshly fetched bytes before they replace `P`
//! - `P.meta` (JSON [`ClientMeta`]) exists while the torrent is out of the client
//! - `P.time` holds the last known remote timestamp as epoch seconds

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::torrent::TORRENT_EXTENSION;
use crate::torrent_client::ClientMeta;

pub const NEWDATA_SUFFIX: &str = "newdata";
pub const META_SUFFIX: &str = "meta";
pub const TIME_SUFFIX: &str = "time";

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

pub fn newdata_path(torrent: &Path) -> PathBuf {
    with_suffix(torrent, NEWDATA_SUFFIX)
}

pub fn meta_path(torrent: &Path) -> PathBuf {
    with_suffix(torrent, META_SUFFIX)
}

pub fn time_path(torrent: &Path) -> PathBuf {
    with_suffix(torrent, TIME_SUFFIX)
}

/// Write `data` and fsync before returning.
pub async fn write_durable(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    Ok(())
}

pub async fn write_meta(torrent: &Path, meta: &ClientMeta) -> io::Result<()> {
    let json = serde_json::to_vec(meta).map_err(io::Error::other)?;
    write_durable(&meta_path(torrent), &json).await
}

pub async fn read_meta(torrent: &Path) -> io::Result<Option<ClientMeta>> {
    match tokio::fs::read(meta_path(torrent)).await {
        Ok(data) => serde_json::from_slice(&data)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Delete the `.meta` sidecar. This is the commit point of a replace.
pub async fn remove_meta(torrent: &Path) -> io::Result<()> {
    tokio::fs::remove_file(meta_path(torrent)).await
}

pub async fn read_time(torrent: &Path) -> io::Result<Option<i64>> {
    match tokio::fs::read_to_string(time_path(torrent)).await {
        Ok(text) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

pub async fn write_time(torrent: &Path, timestamp: i64) -> io::Result<()> {
    write_durable(&time_path(torrent), timestamp.to_string().as_bytes()).await
}

/// The last known remote time, seeded from the torrent file's mtime on the
/// first run. The seed is written out only when `persist` is set.
pub async fn read_or_init_time(torrent: &Path, persist: bool) -> io::Result<i64> {
    if let Some(timestamp) = read_time(torrent).await? {
        return Ok(timestamp);
    }

    let modified = tokio::fs::metadata(torrent).await?.modified()?;
    let timestamp = match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    };
    debug!(torrent = %torrent.display(), timestamp, "Seeded last known time from mtime");

    if persist {
        write_time(torrent, timestamp).await?;
    }
    Ok(timestamp)
}

/// Torrents in `dir` whose `.meta` sidecar survived an interrupted replace.
///
/// Returns the torrent paths, sorted.
pub async fn find_partial_updates(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let suffix = format!(".{}.{}", TORRENT_EXTENSION, META_SUFFIX);
    let mut found = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(stem) = name.strip_suffix(&suffix) {
            found.push(dir.join(format!("{}.{}", stem, TORRENT_EXTENSION)));
        }
    }

    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::torrent_client::Customs;
    use tempfile::TempDir;

    #[test]
    fn test_sidecar_paths() {
        let torrent = Path::new("/srv/a.torrent");
        assert_eq!(newdata_path(torrent), PathBuf::from("/srv/a.torrent.newdata"));
        assert_eq!(meta_path(torrent), PathBuf::from("/srv/a.torrent.meta"));
        assert_eq!(time_path(torrent), PathBuf::from("/srv/a.torrent.time"));
    }

    #[tokio::test]
    async fn test_meta_roundtrip_and_remove() {
        let dir = TempDir::new().unwrap();
        let torrent = dir.path().join("a.torrent");
        assert_eq!(read_meta(&torrent).await.unwrap(), None);

        let meta = ClientMeta {
            prefix: "/data".to_string(),
            customs: Customs::from([("tags".to_string(), "x".to_string())]),
        };
        write_meta(&torrent, &meta).await.unwrap();
        assert_eq!(read_meta(&torrent).await.unwrap(), Some(meta));

        remove_meta(&torrent).await.unwrap();
        assert!(!meta_path(&torrent).exists());
    }

    #[tokio::test]
    async fn test_time_file_is_plain_integer() {
        let dir = TempDir::new().unwrap();
        let torrent = dir.path().join("a.torrent");
        write_time(&torrent, 1_700_000_000).await.unwrap();
        let text = std::fs::read_to_string(time_path(&torrent)).unwrap();
        assert_eq!(text, "1700000000");
        assert_eq!(read_time(&torrent).await.unwrap(), Some(1_700_000_000));
    }

    #[tokio::test]
    async fn test_corrupt_time_file() {
        let dir = TempDir::new().unwrap();
        let torrent = dir.path().join("a.torrent");
        std::fs::write(time_path(&torrent), "yesterday").unwrap();
        let err = read_time(&torrent).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_read_or_init_time_seeds_from_mtime() {
        let dir = TempDir::new().unwrap();
        let torrent = dir.path().join("a.torrent");
        std::fs::write(&torrent, b"x").unwrap();
        let mtime = std::fs::metadata(&torrent)
            .unwrap()
            .modified()
            .unwrap()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;

        assert_eq!(read_or_init_time(&torrent, false).await.unwrap(), mtime);
        assert!(!time_path(&torrent).exists());

        assert_eq!(read_or_init_time(&torrent, true).await.unwrap(), mtime);
        assert_eq!(read_time(&torrent).await.unwrap(), Some(mtime));
    }

    #[tokio::test]
    async fn test_find_partial_updates() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.torrent.meta"), "{}").unwrap();
        std::fs::write(dir.path().join("a.torrent.meta"), "{}").unwrap();
        std::fs::write(dir.path().join("c.torrent.time"), "1").unwrap();
        std::fs::write(dir.path().join("notes.meta"), "{}").unwrap();

        let found = find_partial_updates(dir.path()).await.unwrap();
        assert_eq!(
            found,
            vec![dir.path().join("a.torrent"), dir.path().join("b.torrent")]
        );
    }
}

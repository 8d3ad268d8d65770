//! Crash-safe replacement of a torrent file and its client entry.
//!
//! The steps run in a fixed order so that a crash at any point leaves either
//! the original file untouched or a `.meta` sidecar describing how to restore
//! the client entry:
//!
//! 1. new bytes go to `P.newdata` (fsynced)
//! 2. client prefix and preserved customs go to `P.meta`, then the torrent is
//!    removed from the client
//! 3. `P.newdata` is renamed over `P`
//! 4. the in-memory record is reloaded
//! 5. the torrent is re-added at the recorded prefix, customs are restored,
//!    and `P.meta` is deleted
//! 6. the observed remote time, if any, goes to `P.time`

use std::path::Path;

use anyhow::{anyhow, Context};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, TimeZone};
use regex_lite::{Captures, Regex};
use tracing::{debug, info, warn};

use crate::torrent::TorrentRecord;
use crate::torrent_client::{ClientMeta, Customs, TorrentClient};

use super::sidecar;

/// Format used by a bare `{now}` placeholder.
pub const DEFAULT_NOW_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Client side of a replace.
#[derive(Clone, Copy)]
pub struct ClientContext<'a> {
    pub client: &'a dyn TorrentClient,
    /// Custom fields copied from the old entry to the new one.
    pub save_customs: &'a [String],
    /// Custom fields written after re-adding; values may contain `{now}`.
    pub set_customs: &'a Customs,
}

/// Replace `torrent` on disk and in the client with `new_data`.
pub async fn replace_torrent(
    torrent: &mut TorrentRecord,
    new_data: Vec<u8>,
    client: Option<ClientContext<'_>>,
    remote_time: Option<i64>,
) -> anyhow::Result<()> {
    let path = torrent
        .path()
        .ok_or_else(|| anyhow!("torrent has no file path"))?
        .to_path_buf();
    let old_hash = torrent.info_hash()?.to_string();

    let newdata = sidecar::newdata_path(&path);
    sidecar::write_durable(&newdata, &new_data)
        .await
        .with_context(|| format!("writing {}", newdata.display()))?;
    debug!(path = %newdata.display(), "Wrote new data");

    let meta = match client {
        Some(ctx) => match detach(ctx, &path, &old_hash).await {
            Ok(meta) => Some(meta),
            Err(err) => {
                discard(&newdata).await;
                return Err(err);
            }
        },
        None => None,
    };

    tokio::fs::rename(&newdata, &path)
        .await
        .with_context(|| format!("renaming {} over {}", newdata.display(), path.display()))?;

    torrent
        .replace_bytes(new_data)
        .context("reloading replaced torrent")?;
    let new_hash = torrent.info_hash()?.to_string();

    if let (Some(ctx), Some(meta)) = (client, meta) {
        ctx.client
            .load_torrent(torrent, &meta.prefix)
            .await
            .context("loading torrent into client")?;

        let mut customs = meta.customs;
        for (key, value) in ctx.set_customs {
            customs.insert(key.clone(), resolve_custom_value(value, &Local::now()));
        }
        if !customs.is_empty() {
            match ctx.client.custom_fields() {
                Some(fields) => fields
                    .set_customs(&new_hash, &customs)
                    .await
                    .context("restoring custom fields")?,
                None => warn!(
                    client = %ctx.client.name(),
                    "Client has no custom fields, not restoring them"
                ),
            }
        }

        sidecar::remove_meta(&path)
            .await
            .context("removing .meta sidecar")?;
    }

    if let Some(timestamp) = remote_time {
        sidecar::write_time(&path, timestamp)
            .await
            .context("writing .time sidecar")?;
    }

    info!(path = %path.display(), old_hash = %old_hash, new_hash = %new_hash, "Replaced torrent");
    Ok(())
}

/// Record the client entry in `.meta`, then remove it from the client.
///
/// On failure the client entry is left in place and no `.meta` remains.
async fn detach(
    ctx: ClientContext<'_>,
    path: &Path,
    old_hash: &str,
) -> anyhow::Result<ClientMeta> {
    let meta = ClientMeta {
        prefix: ctx
            .client
            .data_prefix(old_hash)
            .await
            .context("reading data prefix")?,
        customs: saved_customs(ctx, old_hash).await?,
    };

    let detached = async {
        sidecar::write_meta(path, &meta)
            .await
            .context("writing .meta sidecar")?;
        ctx.client
            .remove_torrent(old_hash)
            .await
            .context("removing torrent from client")
    }
    .await;
    if let Err(err) = detached {
        discard(&sidecar::meta_path(path)).await;
        return Err(err);
    }

    debug!(hash = %old_hash, "Removed torrent from client");
    Ok(meta)
}

async fn discard(file: &Path) {
    match tokio::fs::remove_file(file).await {
        Ok(()) => debug!(path = %file.display(), "Discarded sidecar"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %file.display(), error = %e, "Cannot discard sidecar"),
    }
}

async fn saved_customs(ctx: ClientContext<'_>, hash: &str) -> anyhow::Result<Customs> {
    if ctx.save_customs.is_empty() {
        return Ok(Customs::new());
    }
    match ctx.client.custom_fields() {
        Some(fields) => fields
            .get_customs(hash, ctx.save_customs)
            .await
            .context("reading custom fields"),
        None => {
            warn!(
                client = %ctx.client.name(),
                "Client has no custom fields, not saving them"
            );
            Ok(Customs::new())
        }
    }
}

/// Expand `{now}` and `{now:<strftime>}` in a custom value.
///
/// A placeholder with an invalid format is left as written.
pub fn resolve_custom_value<Tz>(value: &str, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let Some(re) = Regex::new(r"\{now(?::([^}]*))?\}").ok() else {
        return value.to_string();
    };
    re.replace_all(value, |caps: &Captures| {
        let format = caps.get(1).map_or(DEFAULT_NOW_FORMAT, |m| m.as_str());
        if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
            caps[0].to_string()
        } else {
            now.format(format).to_string()
        }
    })
    .into_owned()
}

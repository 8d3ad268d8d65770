//! Name → factory table for torrent client backends.

use std::sync::Arc;

use crate::config::{ClientConfig, ConfigError};

use super::{QBittorrentClient, TorrentClient};

/// Builds a client backend from its configuration.
pub type ClientFactory = fn(&ClientConfig) -> Result<Arc<dyn TorrentClient>, ConfigError>;

fn build_qbittorrent(config: &ClientConfig) -> Result<Arc<dyn TorrentClient>, ConfigError> {
    let qb_config = config.qbittorrent.clone().ok_or_else(|| {
        ConfigError::ValidationError(
            "client.qbittorrent section required when backend = \"qbittorrent\"".to_string(),
        )
    })?;
    let client = QBittorrentClient::new(qb_config)
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;
    Ok(Arc::new(client))
}

/// Built-in client backends.
pub const CLIENT_PLUGINS: &[(&str, ClientFactory)] =
    &[("qbittorrent", build_qbittorrent as ClientFactory)];

pub fn is_known_client_backend(name: &str) -> bool {
    CLIENT_PLUGINS.iter().any(|(n, _)| *n == name)
}

/// Instantiate the configured backend.
pub fn build_client(config: &ClientConfig) -> Result<Arc<dyn TorrentClient>, ConfigError> {
    let factory = CLIENT_PLUGINS
        .iter()
        .find(|(name, _)| *name == config.backend)
        .map(|(_, factory)| *factory)
        .ok_or_else(|| {
            ConfigError::ValidationError(format!("unknown client backend '{}'", config.backend))
        })?;
    let client = factory(config)?;
    check_custom_keys(client.as_ref(), config)?;
    Ok(client)
}

/// Reject `save_customs`/`set_customs` keys the client cannot store.
pub fn check_custom_keys(
    client: &dyn TorrentClient,
    config: &ClientConfig,
) -> Result<(), ConfigError> {
    let mut configured = config.save_customs.iter().chain(config.set_customs.keys());
    let Some(fields) = client.custom_fields() else {
        return match configured.next() {
            Some(key) => Err(ConfigError::ValidationError(format!(
                "client '{}' has no custom fields, cannot use '{}'",
                client.name(),
                key
            ))),
            None => Ok(()),
        };
    };

    let supported = fields.custom_keys();
    match configured.find(|key| !supported.contains(&key.as_str())) {
        Some(key) => Err(ConfigError::ValidationError(format!(
            "client '{}' does not support custom field '{}' (supported: {})",
            client.name(),
            key,
            supported.join(", ")
        ))),
        None => Ok(()),
    }
}

//! Name → factory table for tracker plugins.

use std::sync::Arc;

use crate::config::{ConfigError, TrackerConfig};
use crate::fetch::Fetcher;

use super::{GenericTracker, Tracker};

/// Builds a tracker plugin from its configuration.
pub type TrackerFactory = fn(TrackerConfig, Fetcher) -> Result<Arc<dyn Tracker>, ConfigError>;

fn build_generic(config: TrackerConfig, fetcher: Fetcher) -> Result<Arc<dyn Tracker>, ConfigError> {
    Ok(Arc::new(GenericTracker::new(config, fetcher)?))
}

/// Built-in tracker plugins.
pub const TRACKER_PLUGINS: &[(&str, TrackerFactory)] =
    &[("generic", build_generic as TrackerFactory)];

pub fn is_known_tracker_plugin(name: &str) -> bool {
    TRACKER_PLUGINS.iter().any(|(n, _)| *n == name)
}

/// Instantiate one tracker per config entry, in order.
pub fn build_trackers(
    configs: &[TrackerConfig],
    fetcher: &Fetcher,
) -> Result<Vec<Arc<dyn Tracker>>, ConfigError> {
    configs
        .iter()
        .map(|config| {
            let factory = TRACKER_PLUGINS
                .iter()
                .find(|(name, _)| *name == config.plugin)
                .map(|(_, factory)| *factory)
                .ok_or_else(|| {
                    ConfigError::ValidationError(format!(
                        "tracker '{}': unknown plugin '{}'",
                        config.name, config.plugin
                    ))
                })?;
            factory(config.clone(), fetcher.clone())
        })
        .collect()
}

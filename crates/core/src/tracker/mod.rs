//! Tracker plugins.
//!
//! This module provides the `Tracker` trait with its optional capability
//! traits, the configurable `GenericTracker` and the static plugin registry.

mod generic;
pub mod registry;
mod types;

pub use generic::GenericTracker;
pub use registry::{build_trackers, is_known_tracker_plugin};
pub use types::*;

pub(crate) use generic::parse_offset;

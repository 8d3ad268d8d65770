//! Bounded-retry fetch layer.
//!
//! Every tracker request goes through [`fetch`] (usually via a [`Fetcher`]),
//! so retry semantics are the same for all plugins.

mod http;
mod retry;
mod types;

pub use http::HttpOpener;
pub use retry::{fetch, Fetcher};
pub use types::*;

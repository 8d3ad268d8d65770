use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub core: CoreConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub client: Option<ClientConfig>,
    #[serde(default)]
    pub trackers: Vec<TrackerConfig>,
}

/// Batch behaviour
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoreConfig {
    /// Directory holding the `.torrent` files
    #[serde(default = "default_torrents_dir")]
    pub torrents_dir: PathBuf,
    /// Compute outcomes without touching files or the client
    #[serde(default)]
    pub dry_run: bool,
    /// Fetch from every matched tracker even if it reports no change
    #[serde(default)]
    pub force: bool,
    /// Print the file diff of affected torrents
    #[serde(default = "default_true")]
    pub show_diff: bool,
    /// Write a JSON report here after the run
    #[serde(default)]
    pub report_path: Option<PathBuf>,
    /// Hold an advisory lock file in `torrents_dir` for the whole run
    #[serde(default = "default_true")]
    pub lock: bool,
    /// Animate a spinner while waiting on the network
    #[serde(default = "default_true")]
    pub spinner: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            torrents_dir: default_torrents_dir(),
            dry_run: false,
            force: false,
            show_diff: true,
            report_path: None,
            lock: true,
            spinner: true,
        }
    }
}

fn default_torrents_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

/// Retry policy for every tracker request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    /// Per-attempt timeout in seconds (default: 10)
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    /// Retries after the first attempt (default: 5)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Constant pause between attempts in milliseconds (default: 1000)
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
    /// HTTP statuses worth retrying
    #[serde(default = "default_retry_codes")]
    pub retry_codes: Vec<u16>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
            retry_codes: default_retry_codes(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_retry_codes() -> Vec<u16> {
    vec![500, 502, 503, 504]
}

fn default_user_agent() -> String {
    format!("refresher/{}", env!("CARGO_PKG_VERSION"))
}

/// Download client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Client plugin name (e.g., "qbittorrent")
    pub backend: String,
    /// Custom fields copied from the old torrent to the re-added one
    #[serde(default)]
    pub save_customs: Vec<String>,
    /// Custom fields written after re-adding; values may contain `{now}` or
    /// `{now:<strftime>}`
    #[serde(default)]
    pub set_customs: BTreeMap<String, String>,
    /// qBittorrent-specific configuration (required when backend = "qbittorrent")
    #[serde(default)]
    pub qbittorrent: Option<QBittorrentConfig>,
}

/// qBittorrent WebUI configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QBittorrentConfig {
    /// WebUI URL (e.g., "http://localhost:8080")
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u32,
}

fn default_client_timeout() -> u32 {
    30
}

/// How a tracker decides whether a torrent is stale.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Compare the remote torrent's info-hash with the local one
    Hash,
    /// Ask the tracker's scrape endpoint whether the hash is registered
    Scrape,
    /// Compare the page's upload time with the last known one
    Timestamp,
}

/// One tracker site
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerConfig {
    /// Display name, unique across trackers
    pub name: String,
    /// Tracker plugin name (default: "generic")
    #[serde(default = "default_tracker_plugin")]
    pub plugin: String,
    /// Regex matched against the torrent comment; the first capture group
    /// becomes `{id}`
    pub comment_pattern: String,
    pub check: CheckKind,
    /// Torrent download URL template
    pub download_url: String,
    /// Scrape URL template with `{scrape_hash}` (check = "scrape")
    #[serde(default)]
    pub scrape_url: Option<String>,
    /// Details page URL template (check = "timestamp")
    #[serde(default)]
    pub page_url: Option<String>,
    /// Regex whose first capture group is the upload time (check = "timestamp")
    #[serde(default)]
    pub timestamp_pattern: Option<String>,
    /// chrono format of the captured time
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
    /// Fixed offset of the site's clock (e.g., "+03:00"); UTC when unset
    #[serde(default)]
    pub timezone: Option<String>,
    /// URL fetched once at startup to verify the site is reachable
    #[serde(default)]
    pub test_url: Option<String>,
    /// Extra headers sent with every request (cookies, API keys)
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub login: Option<LoginConfig>,
}

fn default_tracker_plugin() -> String {
    "generic".to_string()
}

fn default_timestamp_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

/// Form login performed once at startup
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoginConfig {
    pub url: String,
    #[serde(default)]
    pub form: BTreeMap<String, String>,
    /// Regex that, when found in the response body, means the login failed
    #[serde(default)]
    pub failure_pattern: Option<String>,
}

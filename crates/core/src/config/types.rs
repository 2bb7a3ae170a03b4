use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tag applied to every torrent this tool injects, and used to
/// deprioritize already cross-seeded content when scanning.
pub const XSEED_TAG: &str = "_xseed";

/// Torrents carrying this tag are never cross-seeded.
pub const NOXSEED_TAG: &str = "noxseed";

/// Visibility tags derived from the torrent description's private flag.
pub const PRIVATE_TAG: &str = "private";
pub const PUBLIC_TAG: &str = "public";

/// Prefix of the per-tracker identity tag, e.g. `site:redwood`.
pub const SITE_TAG_PREFIX: &str = "site:";

/// Sentinel filter value that explicitly matches the empty
/// category / empty tag set.
pub const NONE: &str = "none";

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub index: IndexConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub clients: Vec<ClientConfig>,
    #[serde(default)]
    pub trackers: Vec<TrackerConfig>,
    #[serde(default)]
    pub run: RunConfig,
}

/// Remote cross-seed index configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Access token. Required; the run aborts before touching any
    /// client when it is missing.
    pub token: String,
    #[serde(default = "default_index_url")]
    pub base_url: String,
    /// Whether to query the index this run: "forced", "skip" or "auto".
    #[serde(default)]
    pub request_mode: RequestMode,
    /// In auto mode, refresh when the mirror is older than this.
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: i64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_index_url() -> String {
    "https://api.xseedr.example".to_string()
}

fn default_staleness_secs() -> i64 {
    7200
}

fn default_timeout() -> u32 {
    30
}

/// When to refresh the local candidate mirror from the index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestMode {
    Forced,
    Skip,
    #[default]
    Auto,
}

/// Local mirror database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("xseedr.db")
}

/// A download client connection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    pub name: String,
    pub backend: ClientBackend,
    pub url: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

/// Available download client backends
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClientBackend {
    Qbittorrent,
}

/// A tracker site the engine may download candidate torrents from
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TrackerConfig {
    /// Local tracker name, matched against the index site registry.
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub cookie: String,
    /// Download URL template relative to `url`; `{id}` is replaced
    /// with the remote torrent id.
    #[serde(default = "default_download_page")]
    pub download_page: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u32,
}

fn default_download_page() -> String {
    "download.php?id={id}".to_string()
}

/// Knobs of a single engine run
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    /// Torrents smaller than this are not cross-seeded. -1 = no bound.
    #[serde(default = "default_min_size")]
    pub min_torrent_size: i64,
    /// Torrents larger than this are not cross-seeded. -1 = no bound.
    #[serde(default = "default_unbounded")]
    pub max_torrent_size: i64,
    /// Only consider torrents of this category; "none" matches only
    /// the empty category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Only consider torrents carrying one of these (comma-separated)
    /// tags; "none" matches only an empty tag set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Case-insensitive name substring filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_filter: Option<String>,
    /// Only inject candidates from these trackers.
    #[serde(default)]
    pub include_trackers: Vec<String>,
    /// Never inject candidates from these trackers.
    #[serde(default)]
    pub exclude_trackers: Vec<String>,
    /// Stop the run after this many successful injections. -1 = no limit.
    #[serde(default = "default_unbounded")]
    pub max_injections: i64,
    /// Skip a tracker for the rest of the run once it fails this many
    /// times in a row (not-found responses do not count). -1 = never skip.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: i64,
    /// Match and count but never mutate the client.
    #[serde(default)]
    pub dry_run: bool,
    /// Add injected torrents in paused state.
    #[serde(default)]
    pub add_paused: bool,
    /// Skip the client's hash check when injecting. On by default:
    /// the verifier has already established content identity.
    #[serde(default = "default_true")]
    pub skip_hash_check: bool,
    /// Wait between candidate torrents to be gentle with trackers.
    #[serde(default)]
    pub slow_mode: bool,
    /// Extra tags applied to every injected torrent.
    #[serde(default)]
    pub extra_tags: Vec<String>,
    /// Category for injected torrents; defaults to the target's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_override: Option<String>,
    /// Upload ratio limit applied to injected public torrents.
    /// 0 = unlimited. Private torrents never get a limit.
    #[serde(default = "default_public_ratio_limit")]
    pub public_ratio_limit: f64,
}

fn default_min_size() -> i64 {
    1024 * 1024 * 1024
}

fn default_unbounded() -> i64 {
    -1
}

fn default_max_consecutive_failures() -> i64 {
    3
}

fn default_true() -> bool {
    true
}

fn default_public_ratio_limit() -> f64 {
    2.0
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            min_torrent_size: default_min_size(),
            max_torrent_size: default_unbounded(),
            category: None,
            tag: None,
            name_filter: None,
            include_trackers: Vec::new(),
            exclude_trackers: Vec::new(),
            max_injections: default_unbounded(),
            max_consecutive_failures: default_max_consecutive_failures(),
            dry_run: false,
            add_paused: false,
            skip_hash_check: default_true(),
            slow_mode: false,
            extra_tags: Vec::new(),
            category_override: None,
            public_ratio_limit: default_public_ratio_limit(),
        }
    }
}

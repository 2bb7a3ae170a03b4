//! Types for torrent client operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SITE_TAG_PREFIX;

/// Errors that can occur during torrent client operations.
#[derive(Debug, Error)]
pub enum TorrentClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Torrent not found: {0}")]
    TorrentNotFound(String),

    #[error("Invalid torrent data: {0}")]
    InvalidTorrent(String),

    #[error("Add rejected by client: {0}")]
    AddRejected(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,
}

/// State of a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TorrentState {
    Downloading,
    Seeding,
    Paused,
    Checking,
    Queued,
    Stalled,
    Error,
    Unknown,
}

impl TorrentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TorrentState::Downloading => "downloading",
            TorrentState::Seeding => "seeding",
            TorrentState::Paused => "paused",
            TorrentState::Checking => "checking",
            TorrentState::Queued => "queued",
            TorrentState::Stalled => "stalled",
            TorrentState::Error => "error",
            TorrentState::Unknown => "unknown",
        }
    }
}

/// Snapshot of a torrent as held by a download client.
///
/// Read-only for the duration of a run; the engine never mutates it,
/// only issues add/tag calls back through the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorrentInfo {
    /// Info hash (lowercase hex).
    pub hash: String,
    /// Torrent name.
    pub name: String,
    /// Current state.
    pub state: TorrentState,
    /// Download progress (0.0 - 1.0).
    pub progress: f64,
    /// Total size in bytes.
    pub size_bytes: u64,
    /// Absolute path of the torrent's content (file or root folder).
    pub content_path: String,
    /// Save path on disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub save_path: Option<String>,
    /// Category/label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Tags currently set on the torrent.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Domain of the torrent's primary tracker.
    #[serde(default)]
    pub tracker_domain: String,
    /// Last upload/download activity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity_at: Option<DateTime<Utc>>,
}

impl TorrentInfo {
    /// Whether the torrent has finished downloading completely.
    pub fn is_fully_complete(&self) -> bool {
        self.progress >= 1.0
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Whether the torrent carries any of the given tags.
    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.has_tag(t))
    }

    /// The tracker name recorded in a `site:` identity tag, if any.
    pub fn site_from_tag(&self) -> Option<&str> {
        self.tags
            .iter()
            .find_map(|t| t.strip_prefix(SITE_TAG_PREFIX))
            .filter(|s| !s.is_empty())
    }
}

/// A file as realized on disk for a torrent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TorrentFileEntry {
    /// Path relative to the save path.
    pub path: String,
    /// Size in bytes.
    pub size_bytes: u64,
}

/// Options for adding a torrent from raw bytes.
#[derive(Debug, Clone, Default)]
pub struct AddTorrentOptions {
    /// Download/save path; the client default applies when unset.
    pub save_path: Option<String>,
    /// Category/label.
    pub category: Option<String>,
    /// Tags to set on the added torrent.
    pub tags: Vec<String>,
    /// Add in paused state.
    pub paused: bool,
    /// Skip the client's hash check of existing data.
    pub skip_hash_check: bool,
    /// Upload ratio limit; 0 = unlimited.
    pub ratio_limit: f64,
}

/// Trait for download client backends.
///
/// The engine dispatches exclusively through this capability set and
/// never branches on the concrete backend.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// List all torrents held by the client.
    async fn list_torrents(&self) -> Result<Vec<TorrentInfo>, TorrentClientError>;

    /// Get a single torrent by hash; `Ok(None)` when not present.
    async fn get_torrent(&self, hash: &str) -> Result<Option<TorrentInfo>, TorrentClientError>;

    /// Get the realized file list of a torrent.
    async fn get_torrent_files(
        &self,
        hash: &str,
    ) -> Result<Vec<TorrentFileEntry>, TorrentClientError>;

    /// Add a torrent from raw .torrent bytes.
    async fn add_torrent(
        &self,
        data: Vec<u8>,
        options: AddTorrentOptions,
    ) -> Result<(), TorrentClientError>;

    /// Add and/or remove tags on a torrent.
    async fn modify_tags(
        &self,
        hash: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<(), TorrentClientError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn torrent_with_tags(tags: &[&str]) -> TorrentInfo {
        TorrentInfo {
            hash: "abc123".to_string(),
            name: "Test".to_string(),
            state: TorrentState::Seeding,
            progress: 1.0,
            size_bytes: 1024,
            content_path: "/downloads/Test".to_string(),
            save_path: Some("/downloads".to_string()),
            category: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            tracker_domain: "tracker.example".to_string(),
            last_activity_at: None,
        }
    }

    #[test]
    fn test_has_tag() {
        let t = torrent_with_tags(&["_xseed", "site:redwood"]);
        assert!(t.has_tag("_xseed"));
        assert!(!t.has_tag("xseed"));
    }

    #[test]
    fn test_has_any_tag() {
        let t = torrent_with_tags(&["music"]);
        let wanted = vec!["movies".to_string(), "music".to_string()];
        assert!(t.has_any_tag(&wanted));
        assert!(!t.has_any_tag(&["tv".to_string()]));
    }

    #[test]
    fn test_site_from_tag() {
        let t = torrent_with_tags(&["_xseed", "site:redwood"]);
        assert_eq!(t.site_from_tag(), Some("redwood"));

        let t = torrent_with_tags(&["_xseed"]);
        assert_eq!(t.site_from_tag(), None);

        let t = torrent_with_tags(&["site:"]);
        assert_eq!(t.site_from_tag(), None);
    }

    #[test]
    fn test_is_fully_complete() {
        let mut t = torrent_with_tags(&[]);
        assert!(t.is_fully_complete());
        t.progress = 0.99;
        assert!(!t.is_fully_complete());
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(
            serde_json::to_string(&TorrentState::Seeding).unwrap(),
            "\"seeding\""
        );
        assert_eq!(TorrentState::Stalled.as_str(), "stalled");
    }
}

//! Types for tracker site operations.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when downloading from a tracker site.
///
/// `NotFound` is a distinct variant because the failure-isolation
/// policy treats it as "content absent", not "tracker unavailable".
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Torrent not found on tracker")]
    NotFound,

    #[error("Tracker returned HTTP {0}")]
    Http(u16),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Response is not a torrent file")]
    InvalidPayload,

    #[error("No tracker configured with name: {0}")]
    UnknownTracker(String),
}

/// Trait for tracker site backends.
#[async_trait]
pub trait TrackerSite: Send + Sync {
    /// Local tracker name for logging.
    fn name(&self) -> &str;

    /// Download the torrent description bytes for a remote torrent id.
    async fn download_by_id(&self, remote_id: i64) -> Result<Vec<u8>, TrackerError>;
}

/// Resolves local tracker names to site backends.
///
/// The engine instantiates trackers lazily, only for sites that
/// actually produce candidates.
pub trait TrackerProvider: Send + Sync {
    fn tracker(&self, name: &str) -> Result<Arc<dyn TrackerSite>, TrackerError>;
}

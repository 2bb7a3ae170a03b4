//! HTTP tracker site implementation.
//!
//! Downloads torrent descriptions from a tracker's download URL with
//! cookie pass-through. No scraping; the remote id comes from the
//! cross-seed index.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::TrackerConfig;

use super::{TrackerError, TrackerProvider, TrackerSite};

/// Leading bytes a bencoded .torrent file can start with.
const TORRENT_MAGIC_PREFIXES: &[&[u8]] = &[
    b"d8:announce",
    b"d13:announce-list",
    b"d10:created by",
    b"d13:creation date",
];

/// A tracker site reached over plain HTTP(S).
pub struct HttpTracker {
    client: Client,
    config: TrackerConfig,
}

impl HttpTracker {
    pub fn new(config: TrackerConfig) -> Result<Self, TrackerError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| TrackerError::Request(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn download_url(&self, remote_id: i64) -> String {
        let page = self
            .config
            .download_page
            .replace("{id}", &remote_id.to_string());
        format!("{}/{}", self.config.url.trim_end_matches('/'), page)
    }
}

#[async_trait]
impl TrackerSite for HttpTracker {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn download_by_id(&self, remote_id: i64) -> Result<Vec<u8>, TrackerError> {
        let url = self.download_url(remote_id);
        debug!(tracker = %self.config.name, remote_id, "downloading torrent description");

        let mut request = self.client.get(&url);
        if !self.config.cookie.is_empty() {
            request = request.header(reqwest::header::COOKIE, self.config.cookie.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| TrackerError::Request(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 404 {
            return Err(TrackerError::NotFound);
        }
        if !status.is_success() {
            return Err(TrackerError::Http(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TrackerError::Request(e.to_string()))?
            .to_vec();

        if !looks_like_torrent(&bytes) {
            // Trackers answer expired sessions with an HTML login page
            // and HTTP 200.
            return Err(TrackerError::InvalidPayload);
        }

        Ok(bytes)
    }
}

fn looks_like_torrent(bytes: &[u8]) -> bool {
    TORRENT_MAGIC_PREFIXES
        .iter()
        .any(|prefix| bytes.starts_with(prefix))
}

/// Builds `HttpTracker` instances from enabled tracker configurations.
pub struct HttpTrackerProvider {
    configs: HashMap<String, TrackerConfig>,
}

impl HttpTrackerProvider {
    pub fn new(trackers: &[TrackerConfig]) -> Self {
        let configs = trackers
            .iter()
            .filter(|t| !t.disabled)
            .map(|t| (t.name.clone(), t.clone()))
            .collect();
        Self { configs }
    }
}

impl TrackerProvider for HttpTrackerProvider {
    fn tracker(&self, name: &str) -> Result<Arc<dyn TrackerSite>, TrackerError> {
        let config = self
            .configs
            .get(name)
            .ok_or_else(|| TrackerError::UnknownTracker(name.to_string()))?;
        Ok(Arc::new(HttpTracker::new(config.clone())?))
    }
}

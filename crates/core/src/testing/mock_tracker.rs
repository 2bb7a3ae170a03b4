//! Mock tracker site and provider for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::tracker::{TrackerError, TrackerProvider, TrackerSite};

/// Scripted response for a remote torrent id.
#[derive(Debug, Clone)]
pub enum MockDownload {
    Data(Vec<u8>),
    NotFound,
    Error(String),
}

/// Mock implementation of the `TrackerSite` trait.
pub struct MockTracker {
    name: String,
    responses: Arc<RwLock<HashMap<i64, MockDownload>>>,
    requested_ids: Arc<RwLock<Vec<i64>>>,
}

impl MockTracker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            responses: Arc::new(RwLock::new(HashMap::new())),
            requested_ids: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Script the response for a remote id.
    pub async fn respond(&self, remote_id: i64, response: MockDownload) {
        self.responses.write().await.insert(remote_id, response);
    }

    /// Remote ids that were actually requested, in order.
    pub async fn requested_ids(&self) -> Vec<i64> {
        self.requested_ids.read().await.clone()
    }

    /// Number of network attempts made against this tracker.
    pub async fn request_count(&self) -> usize {
        self.requested_ids.read().await.len()
    }
}

#[async_trait]
impl TrackerSite for MockTracker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn download_by_id(&self, remote_id: i64) -> Result<Vec<u8>, TrackerError> {
        self.requested_ids.write().await.push(remote_id);
        match self.responses.read().await.get(&remote_id) {
            Some(MockDownload::Data(bytes)) => Ok(bytes.clone()),
            Some(MockDownload::NotFound) => Err(TrackerError::NotFound),
            Some(MockDownload::Error(message)) => Err(TrackerError::Request(message.clone())),
            None => Err(TrackerError::Request("unscripted remote id".to_string())),
        }
    }
}

/// Mock implementation of the `TrackerProvider` trait.
#[derive(Default)]
pub struct MockTrackerProvider {
    trackers: HashMap<String, Arc<MockTracker>>,
}

impl MockTrackerProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or fetch) the mock tracker for a name.
    pub fn tracker_mock(&mut self, name: &str) -> Arc<MockTracker> {
        self.trackers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MockTracker::new(name)))
            .clone()
    }
}

impl TrackerProvider for MockTrackerProvider {
    fn tracker(&self, name: &str) -> Result<Arc<dyn TrackerSite>, TrackerError> {
        self.trackers
            .get(name)
            .map(|t| t.clone() as Arc<dyn TrackerSite>)
            .ok_or_else(|| TrackerError::UnknownTracker(name.to_string()))
    }
}

//! Mock download client for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::torrent_client::{
    AddTorrentOptions, TorrentClient, TorrentClientError, TorrentFileEntry, TorrentInfo,
    TorrentState,
};
use crate::verifier::decode_descriptor;

/// A recorded add_torrent call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedAdd {
    pub data: Vec<u8>,
    pub options: AddTorrentOptions,
}

/// A recorded modify_tags call for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedTagChange {
    pub hash: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

/// Mock implementation of the `TorrentClient` trait.
///
/// Added torrents become visible through get/list immediately, so
/// repeated engine runs against the same mock behave like a real
/// client that kept the injected torrents.
pub struct MockTorrentClient {
    name: String,
    torrents: Arc<RwLock<HashMap<String, TorrentInfo>>>,
    files: Arc<RwLock<HashMap<String, Vec<TorrentFileEntry>>>>,
    added: Arc<RwLock<Vec<RecordedAdd>>>,
    tag_changes: Arc<RwLock<Vec<RecordedTagChange>>>,
    unreachable: Arc<RwLock<bool>>,
    reject_adds: Arc<RwLock<bool>>,
    hash_counter: Arc<RwLock<u32>>,
}

impl MockTorrentClient {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            torrents: Arc::new(RwLock::new(HashMap::new())),
            files: Arc::new(RwLock::new(HashMap::new())),
            added: Arc::new(RwLock::new(Vec::new())),
            tag_changes: Arc::new(RwLock::new(Vec::new())),
            unreachable: Arc::new(RwLock::new(false)),
            reject_adds: Arc::new(RwLock::new(false)),
            hash_counter: Arc::new(RwLock::new(0)),
        }
    }

    /// Pre-populate a torrent and its realized file list.
    pub async fn add_mock_torrent(&self, info: TorrentInfo, files: Vec<TorrentFileEntry>) {
        let hash = info.hash.clone();
        self.torrents.write().await.insert(hash.clone(), info);
        self.files.write().await.insert(hash, files);
    }

    /// All recorded add_torrent calls.
    pub async fn added_torrents(&self) -> Vec<RecordedAdd> {
        self.added.read().await.clone()
    }

    /// All recorded modify_tags calls.
    pub async fn tag_changes(&self) -> Vec<RecordedTagChange> {
        self.tag_changes.read().await.clone()
    }

    /// Total count of client-mutating calls issued.
    pub async fn mutation_count(&self) -> usize {
        self.added.read().await.len() + self.tag_changes.read().await.len()
    }

    /// Make every call fail as if the client were down.
    pub async fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.write().await = unreachable;
    }

    /// Make add_torrent calls fail while everything else works.
    pub async fn set_reject_adds(&self, reject: bool) {
        *self.reject_adds.write().await = reject;
    }

    pub async fn has_torrent(&self, hash: &str) -> bool {
        self.torrents.read().await.contains_key(hash)
    }

    async fn check_reachable(&self) -> Result<(), TorrentClientError> {
        if *self.unreachable.read().await {
            return Err(TorrentClientError::ConnectionFailed(
                "mock client unreachable".to_string(),
            ));
        }
        Ok(())
    }

    async fn generate_hash(&self) -> String {
        let mut counter = self.hash_counter.write().await;
        *counter += 1;
        format!("mockhash{:08x}", *counter)
    }
}

#[async_trait]
impl TorrentClient for MockTorrentClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_torrents(&self) -> Result<Vec<TorrentInfo>, TorrentClientError> {
        self.check_reachable().await?;
        let torrents = self.torrents.read().await;
        let mut result: Vec<TorrentInfo> = torrents.values().cloned().collect();
        // Deterministic order so tests are stable.
        result.sort_by(|a, b| a.hash.cmp(&b.hash));
        Ok(result)
    }

    async fn get_torrent(&self, hash: &str) -> Result<Option<TorrentInfo>, TorrentClientError> {
        self.check_reachable().await?;
        Ok(self.torrents.read().await.get(hash).cloned())
    }

    async fn get_torrent_files(
        &self,
        hash: &str,
    ) -> Result<Vec<TorrentFileEntry>, TorrentClientError> {
        self.check_reachable().await?;
        self.files
            .read()
            .await
            .get(hash)
            .cloned()
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))
    }

    async fn add_torrent(
        &self,
        data: Vec<u8>,
        options: AddTorrentOptions,
    ) -> Result<(), TorrentClientError> {
        self.check_reachable().await?;
        if *self.reject_adds.read().await {
            return Err(TorrentClientError::AddRejected(
                "mock client rejects adds".to_string(),
            ));
        }

        // Realize the added torrent so subsequent get/list calls see
        // it, like a real client would.
        let (hash, name, size, files) = match decode_descriptor(&data) {
            Ok(descriptor) => {
                let size = descriptor.files.iter().map(|f| f.size_bytes).sum();
                let hash =
                    super::torrent_info_hash(&data).unwrap_or_else(|| descriptor.name.clone());
                (hash, descriptor.name.clone(), size, descriptor.files)
            }
            Err(_) => (self.generate_hash().await, "unknown".to_string(), 0, Vec::new()),
        };

        let info = TorrentInfo {
            hash: hash.clone(),
            name: name.clone(),
            state: TorrentState::Seeding,
            progress: 1.0,
            size_bytes: size,
            content_path: format!(
                "{}/{}",
                options.save_path.as_deref().unwrap_or("/mock"),
                name
            ),
            save_path: options.save_path.clone(),
            category: options.category.clone(),
            tags: options.tags.clone(),
            tracker_domain: String::new(),
            last_activity_at: None,
        };

        self.torrents.write().await.insert(hash.clone(), info);
        self.files.write().await.insert(hash, files);
        self.added.write().await.push(RecordedAdd { data, options });
        Ok(())
    }

    async fn modify_tags(
        &self,
        hash: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<(), TorrentClientError> {
        self.check_reachable().await?;

        let mut torrents = self.torrents.write().await;
        let torrent = torrents
            .get_mut(hash)
            .ok_or_else(|| TorrentClientError::TorrentNotFound(hash.to_string()))?;
        for tag in add {
            if !torrent.tags.contains(tag) {
                torrent.tags.push(tag.clone());
            }
        }
        torrent.tags.retain(|t| !remove.contains(t));

        self.tag_changes.write().await.push(RecordedTagChange {
            hash: hash.to_string(),
            added: add.to_vec(),
            removed: remove.to_vec(),
        });
        Ok(())
    }
}

//! Mock cross-seed index client for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::index::{registry_checksum, CandidateHit, IndexClient, IndexError, SiteRecord};

/// Mock implementation of the `IndexClient` trait.
pub struct MockIndexClient {
    sites: Arc<RwLock<Vec<SiteRecord>>>,
    candidates: Arc<RwLock<HashMap<String, Vec<CandidateHit>>>>,
    fail_lookups: Arc<RwLock<bool>>,
    lookup_pages: Arc<RwLock<Vec<Vec<String>>>>,
}

impl MockIndexClient {
    pub fn new() -> Self {
        Self {
            sites: Arc::new(RwLock::new(Vec::new())),
            candidates: Arc::new(RwLock::new(HashMap::new())),
            fail_lookups: Arc::new(RwLock::new(false)),
            lookup_pages: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn set_sites(&self, sites: Vec<SiteRecord>) {
        *self.sites.write().await = sites;
    }

    /// Script the candidate list returned for a target hash.
    pub async fn set_candidates(&self, target_hash: &str, hits: Vec<CandidateHit>) {
        self.candidates
            .write()
            .await
            .insert(target_hash.to_string(), hits);
    }

    pub async fn set_fail_lookups(&self, fail: bool) {
        *self.fail_lookups.write().await = fail;
    }

    /// The hash pages actually requested, in order.
    pub async fn lookup_pages(&self) -> Vec<Vec<String>> {
        self.lookup_pages.read().await.clone()
    }
}

impl Default for MockIndexClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IndexClient for MockIndexClient {
    async fn sites(&self) -> Result<Vec<SiteRecord>, IndexError> {
        Ok(self.sites.read().await.clone())
    }

    async fn report_existing(&self, sites: &[SiteRecord]) -> Result<String, IndexError> {
        Ok(registry_checksum(sites))
    }

    async fn lookup(
        &self,
        hashes: &[String],
        _registry_checksum: &str,
    ) -> Result<HashMap<String, Vec<CandidateHit>>, IndexError> {
        self.lookup_pages.write().await.push(hashes.to_vec());
        if *self.fail_lookups.read().await {
            return Err(IndexError::RequestFailed("mock lookup failure".to_string()));
        }

        let candidates = self.candidates.read().await;
        let mut result = HashMap::new();
        for hash in hashes {
            if let Some(hits) = candidates.get(hash) {
                result.insert(hash.clone(), hits.clone());
            }
        }
        Ok(result)
    }
}

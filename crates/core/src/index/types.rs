//! Types for the cross-seed index subsystem.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the remote index API.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Index not configured: {0}")]
    NotConfigured(String),

    #[error("Index API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

/// Errors from the local mirror store.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Database error: {0}")]
    Database(String),
}

/// A tracker site as listed in the index's registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub site_id: i64,
    /// Canonical short name.
    pub name: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub url: String,
    /// Download URL template with an `{id}` placeholder.
    #[serde(default)]
    pub download_page: String,
}

/// One cross-seed candidate returned by a hash lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateHit {
    /// Candidate torrent's info hash.
    pub info_hash: String,
    /// Registry id of the publishing site.
    pub site_id: i64,
    /// Torrent id on that site, used for downloading.
    pub remote_id: i64,
}

/// A candidate row as persisted in the mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    pub target_hash: String,
    pub candidate_hash: String,
    pub site_id: i64,
    pub remote_id: i64,
}

/// Trait for the remote cross-seed index service.
#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Fetch the full site registry.
    async fn sites(&self) -> Result<Vec<SiteRecord>, IndexError>;

    /// Report the mirrored registry back to the index and return the
    /// registry checksum subsequent lookups must carry.
    async fn report_existing(&self, sites: &[SiteRecord]) -> Result<String, IndexError>;

    /// Look up cross-seed candidates for a page of local info hashes.
    ///
    /// Returns a map of target hash to its complete candidate list.
    async fn lookup(
        &self,
        hashes: &[String],
        registry_checksum: &str,
    ) -> Result<HashMap<String, Vec<CandidateHit>>, IndexError>;
}

/// Trait for the local mirror cache.
///
/// Candidate rows for a target hash are only ever replaced as a whole
/// set, never merged.
pub trait MirrorStore: Send + Sync {
    /// Replace the entire site registry.
    fn replace_sites(&self, sites: &[SiteRecord]) -> Result<(), MirrorError>;

    fn sites(&self) -> Result<Vec<SiteRecord>, MirrorError>;

    /// Atomically replace candidate rows for every target hash in
    /// `groups`, removing stale rows that reference any of the new
    /// candidate hashes.
    fn replace_candidates(
        &self,
        groups: &HashMap<String, Vec<CandidateHit>>,
    ) -> Result<(), MirrorError>;

    /// All candidate rows whose target hash is in `hashes`.
    fn candidates_for(&self, hashes: &[String]) -> Result<Vec<CandidateRecord>, MirrorError>;

    /// Unix timestamp of the last completed refresh, if any.
    fn last_refresh(&self) -> Result<Option<i64>, MirrorError>;

    fn set_last_refresh(&self, timestamp: i64) -> Result<(), MirrorError>;
}

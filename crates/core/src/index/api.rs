//! HTTP client for the remote cross-seed index API.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::IndexConfig;

use super::{CandidateHit, IndexClient, IndexError, SiteRecord};

/// JSON-over-HTTP index client.
pub struct HttpIndexClient {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpIndexClient {
    /// Create a new index client. Fails when no token is configured;
    /// this is the fatal credential check the run performs before any
    /// client is touched.
    pub fn new(config: &IndexConfig) -> Result<Self, IndexError> {
        if config.token.is_empty() {
            return Err(IndexError::NotConfigured(
                "index token is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| IndexError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, IndexError> {
        let status = response.status();
        if status == 401 || status == 403 {
            return Err(IndexError::NotConfigured("invalid index token".to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::ApiError {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }
        Ok(response)
    }
}

/// Checksum over the mirrored registry, carried by lookup requests so
/// the index can detect a stale mirror.
pub fn registry_checksum(sites: &[SiteRecord]) -> String {
    let mut ids: Vec<i64> = sites.iter().map(|s| s.site_id).collect();
    ids.sort_unstable();
    let joined = ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!("{:x}", Sha256::digest(joined.as_bytes()))
}

#[derive(Debug, Deserialize)]
struct SitesResponse {
    data: Vec<SiteRow>,
}

#[derive(Debug, Deserialize)]
struct SiteRow {
    id: i64,
    site: String,
    #[serde(default)]
    nickname: String,
    #[serde(default)]
    base_url: String,
    #[serde(default)]
    download_page: String,
}

impl From<SiteRow> for SiteRecord {
    fn from(row: SiteRow) -> Self {
        SiteRecord {
            site_id: row.id,
            name: row.site,
            nickname: row.nickname,
            url: row.base_url,
            download_page: row.download_page,
        }
    }
}

#[derive(Debug, Serialize)]
struct ReportRequest<'a> {
    token: &'a str,
    site_ids: Vec<i64>,
    checksum: &'a str,
}

#[derive(Debug, Serialize)]
struct LookupRequest<'a> {
    token: &'a str,
    hashes: &'a [String],
    checksum: &'a str,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    data: HashMap<String, Vec<HitRow>>,
}

#[derive(Debug, Deserialize)]
struct HitRow {
    info_hash: String,
    sid: i64,
    torrent_id: i64,
}

#[async_trait::async_trait]
impl IndexClient for HttpIndexClient {
    async fn sites(&self) -> Result<Vec<SiteRecord>, IndexError> {
        let url = format!("{}/api/v1/sites", self.base_url);
        debug!("fetching index site registry");

        let response = self
            .client
            .get(&url)
            .query(&[("token", self.token.as_str())])
            .send()
            .await
            .map_err(|e| IndexError::RequestFailed(e.to_string()))?;

        let response = Self::check_status(response).await?;
        let parsed: SitesResponse = response
            .json()
            .await
            .map_err(|e| IndexError::ParseError(e.to_string()))?;

        Ok(parsed.data.into_iter().map(SiteRecord::from).collect())
    }

    async fn report_existing(&self, sites: &[SiteRecord]) -> Result<String, IndexError> {
        let checksum = registry_checksum(sites);
        let url = format!("{}/api/v1/sites/report", self.base_url);
        debug!(site_count = sites.len(), "reporting mirrored sites to index");

        let body = ReportRequest {
            token: &self.token,
            site_ids: sites.iter().map(|s| s.site_id).collect(),
            checksum: &checksum,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| IndexError::RequestFailed(e.to_string()))?;

        Self::check_status(response).await?;
        Ok(checksum)
    }

    async fn lookup(
        &self,
        hashes: &[String],
        registry_checksum: &str,
    ) -> Result<HashMap<String, Vec<CandidateHit>>, IndexError> {
        let url = format!("{}/api/v1/hashes", self.base_url);
        debug!(hash_count = hashes.len(), "looking up cross-seed candidates");

        let body = LookupRequest {
            token: &self.token,
            hashes,
            checksum: registry_checksum,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| IndexError::RequestFailed(e.to_string()))?;

        let response = Self::check_status(response).await?;
        let parsed: LookupResponse = response
            .json()
            .await
            .map_err(|e| IndexError::ParseError(e.to_string()))?;

        let mut result = HashMap::new();
        for (target, hits) in parsed.data {
            let hits = hits
                .into_iter()
                .map(|h| CandidateHit {
                    info_hash: h.info_hash.to_lowercase(),
                    site_id: h.sid,
                    remote_id: h.torrent_id,
                })
                .collect();
            result.insert(target.to_lowercase(), hits);
        }
        Ok(result)
    }
}

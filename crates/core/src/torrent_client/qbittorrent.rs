//! qBittorrent torrent client implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{multipart, Client};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::ClientConfig;

use super::{
    AddTorrentOptions, TorrentClient, TorrentClientError, TorrentFileEntry, TorrentInfo,
    TorrentState,
};

/// qBittorrent Web API v2 client.
pub struct QBittorrentClient {
    client: Client,
    config: ClientConfig,
    /// Session marker (refreshed on auth failure); the actual cookie
    /// lives in the reqwest cookie jar.
    session: Arc<RwLock<bool>>,
}

impl QBittorrentClient {
    pub fn new(config: ClientConfig) -> Result<Self, TorrentClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| TorrentClientError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            config,
            session: Arc::new(RwLock::new(false)),
        })
    }

    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    async fn login(&self) -> Result<(), TorrentClientError> {
        let url = format!("{}/api/v2/auth/login", self.base_url());

        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(map_request_error)?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if body.contains("Ok.") {
            debug!(client = %self.config.name, "qBittorrent login successful");
            *self.session.write().await = true;
            Ok(())
        } else if body.contains("Fails.") || status.as_u16() == 403 {
            Err(TorrentClientError::AuthenticationFailed(
                "invalid credentials".to_string(),
            ))
        } else {
            Err(TorrentClientError::AuthenticationFailed(format!(
                "unexpected login response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    async fn ensure_authenticated(&self) -> Result<(), TorrentClientError> {
        if *self.session.read().await {
            return Ok(());
        }
        self.login().await
    }

    /// Authenticated GET, retried once after re-login on 403.
    async fn get(&self, endpoint: &str) -> Result<String, TorrentClientError> {
        self.ensure_authenticated().await?;

        let url = format!("{}{}", self.base_url(), endpoint);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(map_request_error)?;

        if response.status().as_u16() == 403 {
            warn!(client = %self.config.name, "qBittorrent session expired, re-authenticating");
            *self.session.write().await = false;
            self.login().await?;

            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(map_request_error)?;
            return read_body(response).await;
        }

        read_body(response).await
    }

    /// Authenticated POST with form data, retried once after re-login on 403.
    async fn post_form(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<String, TorrentClientError> {
        self.ensure_authenticated().await?;

        let url = format!("{}{}", self.base_url(), endpoint);
        let response = self
            .client
            .post(&url)
            .form(params)
            .send()
            .await
            .map_err(map_request_error)?;

        if response.status().as_u16() == 403 {
            warn!(client = %self.config.name, "qBittorrent session expired, re-authenticating");
            *self.session.write().await = false;
            self.login().await?;

            let response = self
                .client
                .post(&url)
                .form(params)
                .send()
                .await
                .map_err(map_request_error)?;
            return read_body(response).await;
        }

        read_body(response).await
    }

    async fn post_multipart(
        &self,
        endpoint: &str,
        form: multipart::Form,
    ) -> Result<String, TorrentClientError> {
        self.ensure_authenticated().await?;

        let url = format!("{}{}", self.base_url(), endpoint);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(map_request_error)?;

        read_body(response).await
    }
}

fn map_request_error(e: reqwest::Error) -> TorrentClientError {
    if e.is_timeout() {
        TorrentClientError::Timeout
    } else if e.is_connect() {
        TorrentClientError::ConnectionFailed(e.to_string())
    } else {
        TorrentClientError::ApiError(e.to_string())
    }
}

async fn read_body(response: reqwest::Response) -> Result<String, TorrentClientError> {
    let status = response.status();
    if !status.is_success() {
        return Err(TorrentClientError::ApiError(format!("HTTP {}", status)));
    }
    response
        .text()
        .await
        .map_err(|e| TorrentClientError::ApiError(e.to_string()))
}

/// qBittorrent torrent info response row.
#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    hash: String,
    name: String,
    state: String,
    progress: f64,
    size: i64,
    #[serde(default)]
    content_path: String,
    #[serde(default)]
    save_path: String,
    #[serde(default)]
    category: String,
    /// Comma-separated list.
    #[serde(default)]
    tags: String,
    #[serde(default)]
    tracker: String,
    #[serde(default)]
    last_activity: i64,
}

impl QBTorrentInfo {
    fn into_torrent_info(self) -> TorrentInfo {
        TorrentInfo {
            hash: self.hash.to_lowercase(),
            name: self.name,
            state: parse_qb_state(&self.state),
            progress: self.progress,
            size_bytes: self.size.max(0) as u64,
            content_path: self.content_path,
            save_path: if self.save_path.is_empty() {
                None
            } else {
                Some(self.save_path)
            },
            category: if self.category.is_empty() {
                None
            } else {
                Some(self.category)
            },
            tags: split_tags(&self.tags),
            tracker_domain: tracker_domain(&self.tracker),
            last_activity_at: timestamp_to_datetime(self.last_activity),
        }
    }
}

/// qBittorrent file listing response row.
#[derive(Debug, Deserialize)]
struct QBFileEntry {
    name: String,
    size: i64,
}

/// Parse qBittorrent state string to TorrentState.
fn parse_qb_state(state: &str) -> TorrentState {
    match state {
        "downloading" | "forcedDL" | "metaDL" | "allocating" => TorrentState::Downloading,
        "uploading" | "forcedUP" => TorrentState::Seeding,
        "pausedDL" | "pausedUP" | "stoppedDL" | "stoppedUP" => TorrentState::Paused,
        "checkingDL" | "checkingUP" | "checkingResumeData" | "moving" => TorrentState::Checking,
        "queuedDL" | "queuedUP" => TorrentState::Queued,
        "stalledDL" => TorrentState::Stalled,
        // A seeding torrent with no connected peers still counts as
        // seeding for cross-seed eligibility.
        "stalledUP" => TorrentState::Seeding,
        "error" | "missingFiles" => TorrentState::Error,
        _ => TorrentState::Unknown,
    }
}

fn split_tags(tags: &str) -> Vec<String> {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Host part of a tracker announce URL.
fn tracker_domain(tracker_url: &str) -> String {
    let rest = tracker_url
        .split_once("://")
        .map(|(_, r)| r)
        .unwrap_or(tracker_url);
    let host = rest.split(['/', ':']).next().unwrap_or("");
    host.to_string()
}

fn timestamp_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    if ts > 0 {
        Utc.timestamp_opt(ts, 0).single()
    } else {
        None
    }
}

#[async_trait]
impl TorrentClient for QBittorrentClient {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn list_torrents(&self) -> Result<Vec<TorrentInfo>, TorrentClientError> {
        let response = self.get("/api/v2/torrents/info").await?;
        let torrents: Vec<QBTorrentInfo> = serde_json::from_str(&response)
            .map_err(|e| TorrentClientError::ApiError(format!("failed to parse response: {}", e)))?;

        Ok(torrents.into_iter().map(|t| t.into_torrent_info()).collect())
    }

    async fn get_torrent(&self, hash: &str) -> Result<Option<TorrentInfo>, TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        let endpoint = format!("/api/v2/torrents/info?hashes={}", hash_lower);
        let response = self.get(&endpoint).await?;

        let torrents: Vec<QBTorrentInfo> = serde_json::from_str(&response)
            .map_err(|e| TorrentClientError::ApiError(format!("failed to parse response: {}", e)))?;

        Ok(torrents.into_iter().next().map(|t| t.into_torrent_info()))
    }

    async fn get_torrent_files(
        &self,
        hash: &str,
    ) -> Result<Vec<TorrentFileEntry>, TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        let endpoint = format!("/api/v2/torrents/files?hash={}", hash_lower);
        let response = self.get(&endpoint).await?;

        let files: Vec<QBFileEntry> = serde_json::from_str(&response)
            .map_err(|e| TorrentClientError::ApiError(format!("failed to parse response: {}", e)))?;

        if files.is_empty() {
            return Err(TorrentClientError::TorrentNotFound(hash.to_string()));
        }

        Ok(files
            .into_iter()
            .map(|f| TorrentFileEntry {
                path: f.name,
                size_bytes: f.size.max(0) as u64,
            })
            .collect())
    }

    async fn add_torrent(
        &self,
        data: Vec<u8>,
        options: AddTorrentOptions,
    ) -> Result<(), TorrentClientError> {
        let file_part = multipart::Part::bytes(data)
            .file_name("xseed.torrent")
            .mime_str("application/x-bittorrent")
            .map_err(|e| TorrentClientError::InvalidTorrent(e.to_string()))?;

        let mut form = multipart::Form::new().part("torrents", file_part);

        if let Some(path) = options.save_path {
            form = form.text("savepath", path);
        }
        if let Some(category) = options.category {
            form = form.text("category", category);
        }
        if !options.tags.is_empty() {
            form = form.text("tags", options.tags.join(","));
        }
        if options.paused {
            form = form.text("paused", "true").text("stopped", "true");
        }
        if options.skip_hash_check {
            form = form.text("skip_checking", "true");
        }
        if options.ratio_limit > 0.0 {
            form = form.text("ratioLimit", options.ratio_limit.to_string());
        }

        let body = self.post_multipart("/api/v2/torrents/add", form).await?;
        if body.contains("Fails.") {
            return Err(TorrentClientError::AddRejected(
                "client refused the torrent".to_string(),
            ));
        }
        Ok(())
    }

    async fn modify_tags(
        &self,
        hash: &str,
        add: &[String],
        remove: &[String],
    ) -> Result<(), TorrentClientError> {
        let hash_lower = hash.to_lowercase();

        if !add.is_empty() {
            self.post_form(
                "/api/v2/torrents/addTags",
                &[("hashes", hash_lower.as_str()), ("tags", &add.join(","))],
            )
            .await?;
        }
        if !remove.is_empty() {
            self.post_form(
                "/api/v2/torrents/removeTags",
                &[("hashes", hash_lower.as_str()), ("tags", &remove.join(","))],
            )
            .await?;
        }
        Ok(())
    }
}

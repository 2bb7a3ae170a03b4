//! The cross-seed run loop.
//!
//! Strictly sequential: clients one at a time, candidates one at a
//! time. The ordering preserves the breaker's consecutive-failure
//! semantics and keeps per-tracker request rates polite.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info, trace, warn};

use crate::config::{Config, PRIVATE_TAG, PUBLIC_TAG, SITE_TAG_PREFIX, XSEED_TAG};
use crate::index::{
    refresh_mirror, should_refresh, site_name_map, CandidateRecord, IndexClient, MirrorStore,
};
use crate::torrent_client::{
    AddTorrentOptions, TorrentClient, TorrentFileEntry, TorrentInfo,
};
use crate::tracker::{TrackerError, TrackerProvider, TrackerSite};
use crate::verifier::{compare_file_trees, decode_descriptor, CompareResult, ContentDescriptor};

use super::breaker::FailureTracker;
use super::scanner::scan_torrents;
use super::types::{RunCounters, RunError, RunReport};

/// Delay between candidate torrents in slow mode.
const SLOW_MODE_DELAY: Duration = Duration::from_secs(3);

/// Mutable state threaded through one run.
///
/// Explicit fields of a run-scoped value rather than globals, so
/// repeated and tested runs never leak state into each other.
struct RunState {
    breaker: FailureTracker,
    counters: RunCounters,
    tracker_cache: HashMap<String, Arc<dyn TrackerSite>>,
    halted_by_budget: bool,
}

/// The cross-seed engine.
///
/// Dispatches exclusively through the collaborator traits; nothing in
/// here branches on a concrete backend.
pub struct Engine {
    config: Config,
    clients: Vec<Arc<dyn TorrentClient>>,
    trackers: Arc<dyn TrackerProvider>,
    index: Arc<dyn IndexClient>,
    mirror: Arc<dyn MirrorStore>,
}

impl Engine {
    pub fn new(
        config: Config,
        clients: Vec<Arc<dyn TorrentClient>>,
        trackers: Arc<dyn TrackerProvider>,
        index: Arc<dyn IndexClient>,
        mirror: Arc<dyn MirrorStore>,
    ) -> Self {
        Self {
            config,
            clients,
            trackers,
            index,
            mirror,
        }
    }

    /// Execute one batch run.
    pub async fn run(&self) -> Result<RunReport, RunError> {
        let mut counters = RunCounters::default();

        // Scan phase: per-client candidate lists plus the global
        // deduplicated lookup-request set. An unreachable client is
        // skipped; the rest proceed.
        let mut scans: Vec<(Arc<dyn TorrentClient>, Vec<String>)> = Vec::new();
        let mut lookup_hashes: Vec<String> = Vec::new();
        let mut seen_hashes: HashSet<String> = HashSet::new();

        for client in &self.clients {
            let torrents = match client.list_torrents().await {
                Ok(torrents) => torrents,
                Err(e) => {
                    error!(client = client.name(), "client unreachable, skipping: {}", e);
                    continue;
                }
            };
            trace!(client = client.name(), torrents = torrents.len(), "scanned client");

            let scan = scan_torrents(torrents, &self.config.run);
            for hash in &scan.lookup_hashes {
                if seen_hashes.insert(hash.clone()) {
                    lookup_hashes.push(hash.clone());
                }
            }
            counters.candidates_considered += scan.candidate_hashes.len() as u64;
            scans.push((client.clone(), scan.candidate_hashes));
        }

        if counters.candidates_considered == 0 {
            info!("no candidate torrents to cross-seed");
            return Ok(RunReport {
                clients_processed: scans.len(),
                counters,
                halted_by_budget: false,
            });
        }

        // Correlation phase.
        let now = Utc::now();
        if should_refresh(
            self.config.index.request_mode,
            self.mirror.last_refresh()?,
            self.config.index.staleness_secs,
            now,
        ) {
            refresh_mirror(self.index.as_ref(), self.mirror.as_ref(), &lookup_hashes, now).await;
        } else {
            trace!("cross-seed mirror refreshed recently, not querying the index");
        }

        let sites = self.mirror.sites()?;
        let site_map = site_name_map(&sites, &self.config.trackers);
        trace!(sites = site_map.len(), "resolved registry sites to local trackers");

        let mut candidates_by_target: HashMap<String, Vec<CandidateRecord>> = HashMap::new();
        for record in self.mirror.candidates_for(&lookup_hashes)? {
            candidates_by_target
                .entry(record.target_hash.clone())
                .or_default()
                .push(record);
        }

        // Injection phase.
        let mut state = RunState {
            breaker: FailureTracker::new(self.config.run.max_consecutive_failures),
            counters,
            tracker_cache: HashMap::new(),
            halted_by_budget: false,
        };
        let clients_processed = scans.len();

        'run: for (i, (client, hashes)) in scans.iter().enumerate() {
            info!(
                "cross-seeding client ({}/{}) {}",
                i + 1,
                clients_processed,
                client.name()
            );
            for (j, hash) in hashes.iter().enumerate() {
                if self.budget_reached(&state.counters) {
                    state.halted_by_budget = true;
                    info!("injection budget reached, stopping run");
                    break 'run;
                }
                if j > 0 && self.config.run.slow_mode {
                    tokio::time::sleep(SLOW_MODE_DELAY).await;
                }

                let Some(candidates) = candidates_by_target.get(hash) else {
                    debug!(torrent = %hash, "no cross-seed candidates");
                    continue;
                };
                debug!(torrent = %hash, count = candidates.len(), "evaluating candidates");

                let target = match client.get_torrent(hash).await {
                    Ok(Some(target)) => target,
                    Ok(None) => {
                        debug!(torrent = %hash, "target no longer present in client");
                        continue;
                    }
                    Err(e) => {
                        error!(torrent = %hash, "failed to get target torrent: {}", e);
                        continue;
                    }
                };
                state.counters.targets_touched += 1;

                let target_files = match client.get_torrent_files(hash).await {
                    Ok(files) => files,
                    Err(e) => {
                        trace!(torrent = %hash, "failed to get target file list: {}", e);
                        continue;
                    }
                };

                for candidate in candidates {
                    if self.budget_reached(&state.counters) {
                        state.halted_by_budget = true;
                        info!("injection budget reached, stopping run");
                        break 'run;
                    }
                    self.process_candidate(
                        client.as_ref(),
                        &target,
                        &target_files,
                        candidate,
                        &site_map,
                        &mut state,
                    )
                    .await;
                }
            }
        }

        info!(
            "cross-seed run done: {} clients, {} targets, {} matches, {} added",
            clients_processed,
            state.counters.targets_touched,
            state.counters.injection_attempts,
            state.counters.injection_successes,
        );

        Ok(RunReport {
            clients_processed,
            counters: state.counters,
            halted_by_budget: state.halted_by_budget,
        })
    }

    fn budget_reached(&self, counters: &RunCounters) -> bool {
        self.config.run.max_injections >= 0
            && counters.injection_successes as i64 >= self.config.run.max_injections
    }

    fn tracker_allowed(&self, site_name: &str) -> bool {
        let run = &self.config.run;
        if !run.include_trackers.is_empty() {
            return run.include_trackers.iter().any(|t| t == site_name);
        }
        !run.exclude_trackers.iter().any(|t| t == site_name)
    }

    async fn process_candidate(
        &self,
        client: &dyn TorrentClient,
        target: &TorrentInfo,
        target_files: &[TorrentFileEntry],
        candidate: &CandidateRecord,
        site_map: &HashMap<i64, String>,
        state: &mut RunState,
    ) {
        if candidate.candidate_hash == target.hash {
            return;
        }

        let Some(site_name) = site_map.get(&candidate.site_id).cloned() else {
            trace!(
                candidate = %candidate.candidate_hash,
                site_id = candidate.site_id,
                "candidate's site is not configured locally"
            );
            return;
        };

        // Already-held short-circuit: reconcile idempotency tags and
        // move on. Evaluated before the include/exclude filters since
        // tagging content the user already has is always desired.
        let existing = match client.get_torrent(&candidate.candidate_hash).await {
            Ok(existing) => existing,
            Err(e) => {
                error!(
                    candidate = %candidate.candidate_hash,
                    "failed to query client for candidate: {}",
                    e
                );
                return;
            }
        };
        if let Some(existing) = existing {
            trace!(candidate = %existing.hash, "candidate already held, reconciling tags");
            self.reconcile_tags(client, &existing, &site_name).await;
            state.breaker.record_success(&site_name);
            return;
        }

        if !self.tracker_allowed(&site_name) {
            trace!(tracker = %site_name, "tracker filtered out");
            return;
        }

        if state.breaker.is_blocked(&site_name) {
            debug!(
                tracker = %site_name,
                candidate = %candidate.candidate_hash,
                "tracker suppressed after repeated failures"
            );
            return;
        }

        let tracker = match state.tracker_cache.get(&site_name).cloned() {
            Some(tracker) => tracker,
            None => match self.trackers.tracker(&site_name) {
                Ok(tracker) => {
                    state.tracker_cache.insert(site_name.clone(), tracker.clone());
                    tracker
                }
                Err(e) => {
                    warn!(tracker = %site_name, "cannot create tracker backend: {}", e);
                    return;
                }
            },
        };

        info!(
            "cross-seed candidate {} (target {}) from tracker {} (remote id {})",
            candidate.candidate_hash, target.name, site_name, candidate.remote_id
        );

        let bytes = match tracker.download_by_id(candidate.remote_id).await {
            Ok(bytes) => {
                state.breaker.record_success(&site_name);
                bytes
            }
            Err(TrackerError::NotFound) => {
                debug!(
                    candidate = %candidate.candidate_hash,
                    tracker = %site_name,
                    "candidate no longer exists on tracker"
                );
                state.breaker.record_not_found(&site_name);
                return;
            }
            Err(e) => {
                error!(
                    candidate = %candidate.candidate_hash,
                    tracker = %site_name,
                    "failed to download torrent: {}",
                    e
                );
                if state.breaker.record_failure(&site_name) {
                    error!(
                        tracker = %site_name,
                        "tracker failed too many times in a row, skipping it for the rest of the run"
                    );
                }
                return;
            }
        };

        let descriptor = match decode_descriptor(&bytes) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                error!(
                    candidate = %candidate.candidate_hash,
                    "failed to decode torrent description: {}",
                    e
                );
                return;
            }
        };

        match compare_file_trees(target_files, &descriptor.files) {
            CompareResult::FullMatch => {}
            CompareResult::RootFolderMismatchOnly => {
                trace!(
                    candidate = %candidate.candidate_hash,
                    "candidate matches target except for the root folder name"
                );
                return;
            }
            CompareResult::NoMatch => {
                trace!(
                    candidate = %candidate.candidate_hash,
                    "candidate does not structurally match target"
                );
                return;
            }
        }

        state.counters.injection_attempts += 1;
        let options = self.build_add_options(target, &site_name, &descriptor);

        if self.config.run.dry_run {
            debug!(
                candidate = %candidate.candidate_hash,
                client = client.name(),
                "dry run: not adding verified candidate"
            );
            state.counters.injection_successes += 1;
            return;
        }

        match client.add_torrent(bytes, options).await {
            Ok(()) => {
                info!(
                    candidate = %candidate.candidate_hash,
                    client = client.name(),
                    "added cross-seed torrent"
                );
                state.counters.injection_successes += 1;
            }
            Err(e) => {
                // Injection rejection is per-torrent and never feeds
                // the breaker; it tracks download failures only.
                error!(
                    candidate = %candidate.candidate_hash,
                    client = client.name(),
                    "client rejected cross-seed torrent: {}",
                    e
                );
            }
        }
    }

    /// Ensure the marker tag and the current tracker's identity tag
    /// are present, and drop an identity tag naming a different
    /// tracker. No-op when everything is already correct.
    async fn reconcile_tags(
        &self,
        client: &dyn TorrentClient,
        existing: &TorrentInfo,
        site_name: &str,
    ) {
        let mut add = Vec::new();
        let mut remove = Vec::new();

        if !existing.has_tag(XSEED_TAG) {
            add.push(XSEED_TAG.to_string());
        }
        let site_tag = format!("{}{}", SITE_TAG_PREFIX, site_name);
        if !existing.has_tag(&site_tag) {
            add.push(site_tag);
        }
        if let Some(old_site) = existing.site_from_tag() {
            if old_site != site_name {
                remove.push(format!("{}{}", SITE_TAG_PREFIX, old_site));
            }
        }

        if add.is_empty() && remove.is_empty() {
            return;
        }
        if self.config.run.dry_run {
            debug!(torrent = %existing.hash, "dry run: not reconciling tags");
            return;
        }
        if let Err(e) = client.modify_tags(&existing.hash, &add, &remove).await {
            error!(torrent = %existing.hash, "failed to reconcile tags: {}", e);
        }
    }

    fn build_add_options(
        &self,
        target: &TorrentInfo,
        site_name: &str,
        descriptor: &ContentDescriptor,
    ) -> AddTorrentOptions {
        let run = &self.config.run;

        let category = run
            .category_override
            .clone()
            .or_else(|| target.category.clone());

        let mut tags = vec![
            XSEED_TAG.to_string(),
            format!("{}{}", SITE_TAG_PREFIX, site_name),
        ];
        tags.extend(run.extra_tags.iter().cloned());

        // Public torrents get a ratio cap; private ones never do.
        let ratio_limit = if descriptor.private {
            tags.push(PRIVATE_TAG.to_string());
            0.0
        } else {
            tags.push(PUBLIC_TAG.to_string());
            run.public_ratio_limit
        };

        AddTorrentOptions {
            save_path: target.save_path.clone(),
            category,
            tags,
            paused: run.add_paused,
            skip_hash_check: run.skip_hash_check,
            ratio_limit,
        }
    }
}

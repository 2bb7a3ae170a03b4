//! Inventory scanning: candidate selection and lookup-request
//! coalescing over a client's torrent list.

use crate::config::{RunConfig, NONE, NOXSEED_TAG, XSEED_TAG};
use crate::torrent_client::{TorrentInfo, TorrentState};

/// Result of scanning one client.
#[derive(Debug, Default)]
pub struct ClientScan {
    /// Hashes of torrents eligible for cross-seeding, in processing
    /// order.
    pub candidate_hashes: Vec<String>,
    /// Deduplicated hashes to send to the index, one representative
    /// per (size, content path).
    pub lookup_hashes: Vec<String>,
}

/// Scan a client's torrent list.
///
/// Ordering is deterministic so repeated runs process torrents the
/// same way: largest first, never-cross-seeded before already-tagged,
/// least recently active first, tracker domain as the final tie-break.
///
/// The lookup-request set is coalesced by size: torrents of equal size
/// pointing at the same content path are assumed identical and get a
/// single representative; a different content path at the same size is
/// included separately.
pub fn scan_torrents(mut torrents: Vec<TorrentInfo>, run: &RunConfig) -> ClientScan {
    torrents.sort_by(|a, b| {
        b.size_bytes
            .cmp(&a.size_bytes)
            .then_with(|| a.has_tag(XSEED_TAG).cmp(&b.has_tag(XSEED_TAG)))
            .then_with(|| a.last_activity_at.cmp(&b.last_activity_at))
            .then_with(|| a.tracker_domain.cmp(&b.tracker_domain))
    });

    let filter_tags: Vec<String> = run
        .tag
        .as_deref()
        .filter(|t| *t != NONE)
        .map(|t| t.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();
    let name_filter = run.name_filter.as_deref().map(str::to_lowercase);

    let mut scan = ClientScan::default();
    let mut bucket_size: Option<u64> = None;
    let mut bucket_content_paths: Vec<String> = Vec::new();

    for torrent in &torrents {
        // Same-size torrents may be identical content.
        if bucket_size != Some(torrent.size_bytes) {
            bucket_size = Some(torrent.size_bytes);
            bucket_content_paths = vec![torrent.content_path.clone()];
            scan.lookup_hashes.push(torrent.hash.clone());
        } else if !bucket_content_paths.contains(&torrent.content_path) {
            bucket_content_paths.push(torrent.content_path.clone());
            scan.lookup_hashes.push(torrent.hash.clone());
        }

        if !is_eligible(torrent, run, &filter_tags, name_filter.as_deref()) {
            continue;
        }
        scan.candidate_hashes.push(torrent.hash.clone());
    }

    scan
}

fn is_eligible(
    torrent: &TorrentInfo,
    run: &RunConfig,
    filter_tags: &[String],
    name_filter: Option<&str>,
) -> bool {
    let category = torrent.category.as_deref().unwrap_or("");
    match run.category.as_deref() {
        Some(NONE) => {
            if !category.is_empty() {
                return false;
            }
        }
        Some(wanted) => {
            if category != wanted {
                return false;
            }
        }
        // Categories starting with '_' are operational; leave them
        // alone unless explicitly requested.
        None => {
            if category.starts_with('_') {
                return false;
            }
        }
    }

    if torrent.has_tag(NOXSEED_TAG) {
        return false;
    }

    match run.tag.as_deref() {
        Some(NONE) => {
            if !torrent.tags.is_empty() {
                return false;
            }
        }
        Some(_) => {
            if !torrent.has_any_tag(filter_tags) {
                return false;
            }
        }
        None => {}
    }

    if torrent.state != TorrentState::Seeding || !torrent.is_fully_complete() {
        return false;
    }

    let size = torrent.size_bytes as i64;
    if run.min_torrent_size >= 0 && size < run.min_torrent_size {
        return false;
    }
    if run.max_torrent_size >= 0 && size > run.max_torrent_size {
        return false;
    }

    if let Some(filter) = name_filter {
        if !torrent.name.to_lowercase().contains(filter) {
            return false;
        }
    }

    true
}

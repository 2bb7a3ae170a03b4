//! Correlation between local torrents and the remote index.
//!
//! Owns the mirror refresh policy (forced/skip/auto with a staleness
//! threshold), the paged lookup protocol, and the resolution of
//! registry site ids to locally configured tracker names.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, error, trace, warn};

use crate::config::{RequestMode, TrackerConfig};

use super::{IndexClient, MirrorStore, SiteRecord};

/// Maximum number of info hashes per lookup request.
pub const MAX_LOOKUP_BATCH: usize = 2000;

/// Whether the mirror should be refreshed this run.
pub fn should_refresh(
    mode: RequestMode,
    last_refresh: Option<i64>,
    staleness_secs: i64,
    now: DateTime<Utc>,
) -> bool {
    match mode {
        RequestMode::Forced => true,
        RequestMode::Skip => false,
        RequestMode::Auto => match last_refresh {
            None => true,
            Some(ts) => now.timestamp() - ts >= staleness_secs,
        },
    }
}

/// Refresh the mirror: site registry first, then the lookup-request
/// set in pages. A failed page is logged and does not abort later
/// pages. The last-refresh timestamp is written once, after all pages,
/// and only if at least one page landed, so a fully failed refresh
/// leaves staleness unchanged.
pub async fn refresh_mirror(
    index: &dyn IndexClient,
    mirror: &dyn MirrorStore,
    hashes: &[String],
    now: DateTime<Utc>,
) {
    debug!(hash_count = hashes.len(), "refreshing cross-seed mirror");

    let mut checksum = String::new();
    match index.sites().await {
        Ok(sites) => {
            if let Err(e) = mirror.replace_sites(&sites) {
                error!("failed to store site registry: {}", e);
            }
            match index.report_existing(&sites).await {
                Ok(c) => checksum = c,
                Err(e) => warn!("failed to report mirrored sites: {}", e),
            }
        }
        Err(e) => error!("failed to fetch site registry: {}", e),
    }

    let mut any_page_succeeded = false;
    for page in hashes.chunks(MAX_LOOKUP_BATCH) {
        match index.lookup(page, &checksum).await {
            Ok(groups) => {
                debug!(targets = groups.len(), "lookup page returned candidates");
                match mirror.replace_candidates(&groups) {
                    Ok(()) => any_page_succeeded = true,
                    Err(e) => error!("failed to store candidate page: {}", e),
                }
            }
            Err(e) => error!("lookup page failed: {}", e),
        }
    }

    if any_page_succeeded {
        if let Err(e) = mirror.set_last_refresh(now.timestamp()) {
            error!("failed to record refresh time: {}", e);
        }
    }
}

/// Build the site-id to local-tracker-name map for this run.
///
/// A registry entry matches an enabled tracker when its name or
/// nickname equals the tracker name (case-insensitive), or when both
/// carry the same URL host.
pub fn site_name_map(sites: &[SiteRecord], trackers: &[TrackerConfig]) -> HashMap<i64, String> {
    let mut map = HashMap::new();
    for tracker in trackers.iter().filter(|t| !t.disabled) {
        let tracker_host = url_host(&tracker.url);
        for site in sites {
            let matched = site.name.eq_ignore_ascii_case(&tracker.name)
                || (!site.nickname.is_empty() && site.nickname.eq_ignore_ascii_case(&tracker.name))
                || (!tracker_host.is_empty() && url_host(&site.url) == tracker_host);
            if matched {
                trace!(
                    site_id = site.site_id,
                    tracker = %tracker.name,
                    "resolved registry site to local tracker"
                );
                map.insert(site.site_id, tracker.name.clone());
            }
        }
    }
    map
}

fn url_host(url: &str) -> String {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    rest.split(['/', ':'])
        .next()
        .unwrap_or("")
        .to_ascii_lowercase()
}

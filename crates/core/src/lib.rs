//! xseedr core: cross-seed matching and injection engine.
//!
//! Scans download clients for fully seeded content, correlates it
//! against a remote cross-seed index through a local SQLite mirror,
//! verifies candidate torrents structurally against the on-disk file
//! layout, and injects verified matches back into the client.

pub mod config;
pub mod engine;
pub mod index;
pub mod testing;
pub mod torrent_client;
pub mod tracker;
pub mod verifier;

pub use config::{
    load_config, load_config_from_str, validate_config, ClientBackend, ClientConfig, Config,
    ConfigError, IndexConfig, RequestMode, RunConfig, TrackerConfig,
};
pub use engine::{Engine, FailureTracker, RunCounters, RunError, RunReport};
pub use index::{
    CandidateHit, CandidateRecord, HttpIndexClient, IndexClient, IndexError, MirrorStore,
    SiteRecord, SqliteMirror,
};
pub use torrent_client::{
    AddTorrentOptions, QBittorrentClient, TorrentClient, TorrentClientError, TorrentFileEntry,
    TorrentInfo, TorrentState,
};
pub use tracker::{HttpTracker, HttpTrackerProvider, TrackerError, TrackerProvider, TrackerSite};
pub use verifier::{compare_file_trees, decode_descriptor, CompareResult, ContentDescriptor};

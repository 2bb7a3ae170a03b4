//! Cross-seed index subsystem.
//!
//! The remote index maps info hashes of held torrents to candidate
//! torrents published on other tracker sites. A local SQLite mirror
//! caches its answers between runs; the correlator decides when to
//! refresh and resolves registry site ids to local tracker names.

mod api;
mod correlator;
mod mirror;
mod types;

pub use api::{registry_checksum, HttpIndexClient};
pub use correlator::{refresh_mirror, should_refresh, site_name_map, MAX_LOOKUP_BATCH};
pub use mirror::SqliteMirror;
pub use types::*;

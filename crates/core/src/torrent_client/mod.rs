//! Download client abstraction.
//!
//! The engine talks to clients through the `TorrentClient` capability
//! set ({list, get, get_files, add, modify_tags}).

mod qbittorrent;
mod types;

pub use qbittorrent::QBittorrentClient;
pub use types::*;

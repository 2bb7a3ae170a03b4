//! Mock collaborators for unit and integration tests.

mod mock_index;
mod mock_torrent_client;
mod mock_tracker;

pub use mock_index::MockIndexClient;
pub use mock_torrent_client::{MockTorrentClient, RecordedAdd, RecordedTagChange};
pub use mock_tracker::{MockDownload, MockTracker, MockTrackerProvider};

/// Info hash of raw .torrent bytes, for wiring fixtures to candidate
/// records.
pub fn torrent_info_hash(data: &[u8]) -> Option<String> {
    use librqbit_core::torrent_metainfo::{torrent_from_bytes, TorrentMetaV1Owned};
    let torrent: TorrentMetaV1Owned = torrent_from_bytes(data).ok()?;
    Some(torrent.info_hash.as_string())
}

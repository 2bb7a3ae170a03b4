//! Torrent description decoding.
//!
//! Uses librqbit-core to parse bencoded .torrent data into the
//! structural summary the verifier compares: display name, privacy
//! flag, and the (path, size) file list.

use librqbit_core::torrent_metainfo::{torrent_from_bytes, TorrentMetaV1Owned};
use thiserror::Error;

use crate::torrent_client::TorrentFileEntry;

/// Errors that can occur when decoding a torrent description.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("Failed to parse torrent: {0}")]
    ParseError(String),

    #[error("Empty torrent (no files)")]
    EmptyTorrent,
}

/// Decoded structural summary of a torrent description.
///
/// Compared against a client's realized file list; never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDescriptor {
    /// Display name (root folder for multi-file torrents).
    pub name: String,
    /// Whether the info dictionary marks the torrent private.
    pub private: bool,
    /// File multiset: relative path plus size.
    pub files: Vec<TorrentFileEntry>,
}

/// Decode raw .torrent bytes into a `ContentDescriptor`.
///
/// Supports both single-file and multi-file torrents; multi-file
/// paths are prefixed with the root name, matching how clients
/// realize them on disk.
pub fn decode_descriptor(bytes: &[u8]) -> Result<ContentDescriptor, DescriptorError> {
    let torrent: TorrentMetaV1Owned =
        torrent_from_bytes(bytes).map_err(|e| DescriptorError::ParseError(e.to_string()))?;

    let info = &torrent.info;

    let name = info
        .name
        .as_ref()
        .map(|b| bytes_to_string(b.as_ref()))
        .unwrap_or_else(|| "unknown".to_string());

    let files = if let Some(ref files) = info.files {
        let mut result = Vec::with_capacity(files.len());
        for file in files {
            let mut path_parts = vec![name.clone()];
            for part in &file.path {
                path_parts.push(bytes_to_string(part.as_ref()));
            }
            result.push(TorrentFileEntry {
                path: path_parts.join("/"),
                size_bytes: file.length,
            });
        }
        if result.is_empty() {
            return Err(DescriptorError::EmptyTorrent);
        }
        result
    } else if let Some(length) = info.length {
        vec![TorrentFileEntry {
            path: name.clone(),
            size_bytes: length,
        }]
    } else {
        return Err(DescriptorError::EmptyTorrent);
    };

    Ok(ContentDescriptor {
        name,
        private: has_private_flag(bytes),
        files,
    })
}

/// Whether the info dictionary carries `private = 1`.
///
/// The metainfo struct does not surface this key, so it is located in
/// the raw bencode; the encoding of the flag is fixed (`7:privatei1e`).
fn has_private_flag(bytes: &[u8]) -> bool {
    let needle = b"7:privatei1e";
    bytes.windows(needle.len()).any(|w| w == needle)
}

/// Convert bytes to a UTF-8 string, replacing invalid sequences.
fn bytes_to_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

//! Structural comparison of file trees.

use std::collections::HashMap;

use crate::torrent_client::TorrentFileEntry;

/// Outcome of comparing a candidate descriptor against a target's
/// realized file list.
///
/// An explicit three-variant result: callers must distinguish the
/// root-folder-only case from a true mismatch, and only `FullMatch`
/// may proceed to injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareResult {
    /// The (path, size) multisets are equal.
    FullMatch,
    /// Equal only after stripping one uniform leading path component
    /// from both sides. Never injected; logged distinctly so renamed
    /// root folders are diagnosable.
    RootFolderMismatchOnly,
    /// Neither condition holds.
    NoMatch,
}

/// Compare two file multisets.
pub fn compare_file_trees(
    target: &[TorrentFileEntry],
    candidate: &[TorrentFileEntry],
) -> CompareResult {
    if multisets_equal(target.iter(), candidate.iter()) {
        return CompareResult::FullMatch;
    }

    if let (Some(target_stripped), Some(candidate_stripped)) =
        (strip_uniform_root(target), strip_uniform_root(candidate))
    {
        if multisets_equal(target_stripped.iter(), candidate_stripped.iter()) {
            return CompareResult::RootFolderMismatchOnly;
        }
    }

    CompareResult::NoMatch
}

fn multisets_equal<'a>(
    a: impl Iterator<Item = &'a TorrentFileEntry>,
    b: impl Iterator<Item = &'a TorrentFileEntry>,
) -> bool {
    let mut counts: HashMap<(&str, u64), i64> = HashMap::new();
    for entry in a {
        *counts.entry((entry.path.as_str(), entry.size_bytes)).or_default() += 1;
    }
    for entry in b {
        *counts.entry((entry.path.as_str(), entry.size_bytes)).or_default() -= 1;
    }
    counts.values().all(|&c| c == 0)
}

/// Strip the single leading path component shared by every entry.
/// Returns None when entries disagree on the root or have no
/// subdirectory structure to strip.
fn strip_uniform_root(files: &[TorrentFileEntry]) -> Option<Vec<TorrentFileEntry>> {
    let mut root: Option<&str> = None;
    let mut stripped = Vec::with_capacity(files.len());
    for entry in files {
        let (first, rest) = entry.path.split_once('/')?;
        match root {
            None => root = Some(first),
            Some(r) if r != first => return None,
            Some(_) => {}
        }
        if rest.is_empty() {
            return None;
        }
        stripped.push(TorrentFileEntry {
            path: rest.to_string(),
            size_bytes: entry.size_bytes,
        });
    }
    if stripped.is_empty() {
        return None;
    }
    Some(stripped)
}

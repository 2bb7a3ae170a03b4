//! Content identity verification.
//!
//! Decodes downloaded torrent descriptions and compares their file
//! trees against the target torrent's realized on-disk layout.

mod compare;
mod parser;

pub use compare::{compare_file_trees, CompareResult};
pub use parser::{decode_descriptor, ContentDescriptor, DescriptorError};

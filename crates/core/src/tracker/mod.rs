//! Tracker site abstraction.
//!
//! A tracker exposes a single capability to the engine: download a
//! torrent description by its remote numeric id.

mod http;
mod types;

pub use http::{HttpTracker, HttpTrackerProvider};
pub use types::*;

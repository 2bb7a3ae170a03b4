//! The cross-seed matching and injection engine.

mod breaker;
mod run;
mod scanner;
mod types;

pub use breaker::FailureTracker;
pub use run::Engine;
pub use scanner::{scan_torrents, ClientScan};
pub use types::{RunCounters, RunError, RunReport};

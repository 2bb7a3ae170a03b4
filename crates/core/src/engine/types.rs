//! Engine run types.

use serde::Serialize;
use thiserror::Error;

use crate::index::{IndexError, MirrorError};

/// Errors that abort an entire run.
///
/// Almost everything is isolated (per client, per candidate, per
/// tracker); only a broken local mirror or a missing credential is
/// fatal.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Mirror(#[from] MirrorError),
}

/// Run-scoped counters, reported at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    /// Local torrents that passed the eligibility filters.
    pub candidates_considered: u64,
    /// Target torrents that had candidates and were fetched.
    pub targets_touched: u64,
    /// Verified full matches handed to the injection step.
    pub injection_attempts: u64,
    /// Additions accepted by the client (or counted in dry-run).
    pub injection_successes: u64,
}

/// Summary of one engine run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub clients_processed: usize,
    pub counters: RunCounters,
    /// Whether the run stopped early because the injection budget was
    /// reached.
    pub halted_by_budget: bool,
}

//! Per-tracker consecutive-failure isolation.

use std::collections::HashMap;

/// Run-scoped consecutive-failure counts per tracker name.
///
/// Only download failures count; a not-found response signals missing
/// content rather than tracker trouble and resets the streak. State
/// never outlives the run.
#[derive(Debug)]
pub struct FailureTracker {
    /// Skip a tracker once its streak strictly exceeds this.
    /// Negative disables the breaker entirely.
    threshold: i64,
    counts: HashMap<String, i64>,
}

impl FailureTracker {
    pub fn new(threshold: i64) -> Self {
        Self {
            threshold,
            counts: HashMap::new(),
        }
    }

    fn count(&self, tracker: &str) -> i64 {
        self.counts.get(tracker).copied().unwrap_or(0)
    }

    /// Whether further attempts against this tracker are suppressed.
    pub fn is_blocked(&self, tracker: &str) -> bool {
        self.threshold >= 0 && self.count(tracker) > self.threshold
    }

    /// Record a non-not-found download failure. Returns true exactly
    /// when this failure newly pushes the streak past the threshold,
    /// so callers can log the transition once.
    pub fn record_failure(&mut self, tracker: &str) -> bool {
        let count = self.counts.entry(tracker.to_string()).or_insert(0);
        *count += 1;
        self.threshold >= 0 && *count == self.threshold + 1
    }

    /// Record a not-found response: content absent, tracker healthy.
    pub fn record_not_found(&mut self, tracker: &str) {
        self.counts.insert(tracker.to_string(), 0);
    }

    /// Record a successful download or already-held reconciliation.
    pub fn record_success(&mut self, tracker: &str) {
        self.counts.insert(tracker.to_string(), 0);
    }
}

//! State update outcome classification and counters.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of one submitted state update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStatus {
    /// The update changed the state and the result was published.
    Applied,
    /// The update ran but produced no change.
    NoChange,
    /// The update failed its own validation; nothing was published.
    Rejected,
    /// The hardware layer refused the batch containing this update.
    HwFailed,
    /// The pipeline stopped before the update ran.
    Dropped,
}

impl UpdateStatus {
    /// Returns true if the submitter's intent is now reflected in the
    /// published state.
    pub fn is_success(&self) -> bool {
        matches!(self, UpdateStatus::Applied | UpdateStatus::NoChange)
    }

    /// Returns true if the update failed permanently.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            UpdateStatus::Rejected | UpdateStatus::HwFailed | UpdateStatus::Dropped
        )
    }
}

impl fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UpdateStatus::Applied => "applied",
            UpdateStatus::NoChange => "no_change",
            UpdateStatus::Rejected => "rejected",
            UpdateStatus::HwFailed => "hw_failed",
            UpdateStatus::Dropped => "dropped",
        };
        write!(f, "{}", s)
    }
}

/// Running totals per [`UpdateStatus`], plus published batch count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounters {
    pub batches_published: u64,
    pub applied: u64,
    pub no_change: u64,
    pub rejected: u64,
    pub hw_failed: u64,
    pub dropped: u64,
}

impl StatusCounters {
    pub fn record(&mut self, status: UpdateStatus) {
        match status {
            UpdateStatus::Applied => self.applied += 1,
            UpdateStatus::NoChange => self.no_change += 1,
            UpdateStatus::Rejected => self.rejected += 1,
            UpdateStatus::HwFailed => self.hw_failed += 1,
            UpdateStatus::Dropped => self.dropped += 1,
        }
    }

    /// Total number of updates that reached a final status.
    pub fn total(&self) -> u64 {
        self.applied + self.no_change + self.rejected + self.hw_failed + self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_status_classification() {
        assert!(UpdateStatus::Applied.is_success());
        assert!(UpdateStatus::NoChange.is_success());
        assert!(!UpdateStatus::Rejected.is_success());

        assert!(UpdateStatus::Rejected.is_failure());
        assert!(UpdateStatus::HwFailed.is_failure());
        assert!(UpdateStatus::Dropped.is_failure());
        assert!(!UpdateStatus::Applied.is_failure());
    }

    #[test]
    fn test_counters() {
        let mut counters = StatusCounters::default();
        counters.record(UpdateStatus::Applied);
        counters.record(UpdateStatus::Applied);
        counters.record(UpdateStatus::Rejected);
        counters.record(UpdateStatus::HwFailed);

        assert_eq!(counters.applied, 2);
        assert_eq!(counters.rejected, 1);
        assert_eq!(counters.hw_failed, 1);
        assert_eq!(counters.total(), 4);
    }

    #[test]
    fn test_display() {
        assert_eq!(UpdateStatus::NoChange.to_string(), "no_change");
        assert_eq!(UpdateStatus::HwFailed.to_string(), "hw_failed");
    }
}

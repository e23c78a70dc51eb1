//! Fetch options, outcomes and constants.

use crate::snapshot::Snapshot;

/// Default size of the member worker pool.
pub const DEFAULT_WORKERS: usize = 10;

/// Options for [`fetch_all`](super::fetch_all).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Maximum members fetched concurrently. Independent of member count.
    pub workers: usize,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
        }
    }
}

impl FetchOptions {
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

/// Aggregate counts for one fan-out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Members submitted.
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Logins reported absent, in completion order.
    pub failed_members: Vec<String>,
}

/// Result of [`fetch_all`](super::fetch_all).
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// Every member that was fully retrieved.
    pub snapshot: Snapshot,
    pub summary: FetchSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_options_default() {
        let options = FetchOptions::default();
        assert_eq!(options.workers, DEFAULT_WORKERS);
        assert_eq!(options.with_workers(3).workers, 3);
    }

    #[test]
    fn test_fetch_summary_default() {
        let summary = FetchSummary::default();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed, 0);
        assert!(summary.failed_members.is_empty());
    }
}

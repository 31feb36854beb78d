//! Engine options and walk statistics.

use std::ops::AddAssign;
use std::time::Duration;

use crate::key::KeyAlgorithm;
use crate::platform::{DEFAULT_BUDGET_THRESHOLD, DEFAULT_COOLDOWN_MARGIN};

/// Pause between consecutive full walks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::ZERO;

/// Pause after a failed walk before the next one.
pub const DEFAULT_ERROR_DELAY: Duration = Duration::from_secs(30);

/// Offset added to a reference timestamp to open the comment fetch window.
pub const FETCH_WINDOW_OFFSET_SECS: i64 = 1;

/// Options controlling the engine.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Repositories (`owner/name`) to walk; `None` walks every repository
    /// visible to the authenticated account.
    pub repositories: Option<Vec<String>>,
    /// Algorithm for record keys.
    pub key_algorithm: KeyAlgorithm,
    /// Pause between full walks in the polling loop.
    pub poll_interval: Duration,
    /// Pause after a failed walk.
    pub error_delay: Duration,
    /// Remaining-call threshold below which the walk cools down.
    pub budget_threshold: usize,
    /// Extra wait after the budget reset time.
    pub cooldown_margin: Duration,
    /// Concurrent target writes; 0 selects the available parallelism.
    pub fanout_workers: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            repositories: None,
            key_algorithm: KeyAlgorithm::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            error_delay: DEFAULT_ERROR_DELAY,
            budget_threshold: DEFAULT_BUDGET_THRESHOLD,
            cooldown_margin: DEFAULT_COOLDOWN_MARGIN,
            fanout_workers: 0,
        }
    }
}

impl SyncOptions {
    /// Parse a comma separated repository list; blank entries are dropped.
    pub fn parse_repositories(list: &str) -> Option<Vec<String>> {
        let repositories: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from)
            .collect();
        (!repositories.is_empty()).then_some(repositories)
    }
}

/// Counters for one walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    /// Repositories walked.
    pub repositories: usize,
    /// Issues inspected.
    pub issues: usize,
    /// Issues whose comment fetch was skipped as unchanged.
    pub skipped_issues: usize,
    /// Comments fetched.
    pub comments: usize,
    /// Records delivered to the fan-out writer.
    pub records: usize,
}

impl AddAssign for WalkStats {
    fn add_assign(&mut self, other: Self) {
        self.repositories += other.repositories;
        self.issues += other.issues;
        self.skipped_issues += other.skipped_issues;
        self.comments += other.comments;
        self.records += other.records;
    }
}

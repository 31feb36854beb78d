//! Progress events emitted by the engine.
//!
//! The engine logs through `tracing` on its own; these events exist for
//! callers that want to render progress (counters, spinners) themselves.

use std::time::Duration;

use super::types::WalkStats;

/// Which walk of the start-up sequence is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkPass {
    /// First pass, filtered by the cursor snapshot.
    WarmUp,
    /// Unfiltered pass (the second start-up walk and every polling walk).
    Full,
}

/// Progress events emitted during a walk or a webhook delivery.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// A walk started.
    WalkStarted {
        pass: WalkPass,
        /// Repositories to visit.
        repositories: usize,
    },

    /// Starting a repository.
    RepositoryStarted { repository: String },

    /// Repository skipped because the cursor reports it as walked.
    RepositorySkipped { repository: String },

    /// Finished a repository.
    RepositoryComplete {
        repository: String,
        /// Records delivered for this repository.
        records: usize,
    },

    /// Issue unchanged since the last walk; comments not fetched.
    IssueUnchanged {
        repository: String,
        issue_number: u64,
    },

    /// Fetched the comment window of an issue.
    CommentsFetched {
        repository: String,
        issue_number: u64,
        count: usize,
    },

    /// Slept because the rate budget ran low.
    CooledDown { wait: Duration },

    /// A storage target failed to accept a record.
    DeliveryFailed {
        target: String,
        record_id: String,
        error: String,
    },

    /// A webhook event was stored.
    EventIngested { record_id: String },

    /// A walk finished.
    WalkComplete { pass: WalkPass, stats: WalkStats },

    /// A walk ended with an error; the loop will retry.
    WalkFailed { error: String },
}

/// Callback type for progress reporting.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Helper to emit progress events.
#[inline]
pub fn emit(callback: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = callback {
        cb(event);
    }
}

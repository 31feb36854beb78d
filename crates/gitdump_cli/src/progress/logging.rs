use gitdump::sync::SyncProgress;

/// Logging reporter using tracing for structured output.
///
/// The engine already logs failures itself, so per-record events stay at
/// debug level here.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::WalkStarted { pass, repositories } => {
                tracing::info!(?pass, repositories, "Walk started");
            }

            SyncProgress::RepositoryStarted { repository } => {
                tracing::debug!(repo = %repository, "Walking repository");
            }

            SyncProgress::RepositorySkipped { repository } => {
                tracing::debug!(repo = %repository, "Skipped, already walked");
            }

            SyncProgress::RepositoryComplete {
                repository,
                records,
            } => {
                tracing::info!(repo = %repository, records, "Repository complete");
            }

            SyncProgress::IssueUnchanged {
                repository,
                issue_number,
            } => {
                tracing::debug!(repo = %repository, issue_number, "Issue unchanged");
            }

            SyncProgress::CommentsFetched {
                repository,
                issue_number,
                count,
            } => {
                tracing::debug!(repo = %repository, issue_number, count, "Fetched comments");
            }

            SyncProgress::CooledDown { wait } => {
                tracing::info!(wait_secs = wait.as_secs(), "Cooled down for rate budget");
            }

            SyncProgress::DeliveryFailed {
                target,
                record_id,
                error,
            } => {
                tracing::debug!(store = %target, record_id = %record_id, error = %error, "Delivery failed");
            }

            SyncProgress::EventIngested { record_id } => {
                tracing::debug!(record_id = %record_id, "Event ingested");
            }

            SyncProgress::WalkComplete { pass, stats } => {
                tracing::info!(
                    ?pass,
                    repositories = stats.repositories,
                    issues = stats.issues,
                    skipped_issues = stats.skipped_issues,
                    comments = stats.comments,
                    records = stats.records,
                    "Walk complete"
                );
            }

            SyncProgress::WalkFailed { error } => {
                tracing::debug!(error = %error, "Walk failed");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}

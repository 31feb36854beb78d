//! The synchronization engine.
//!
//! A walk visits repository → issue → comment:
//!
//! 1. Every repository (explicit list or all visible ones) is snapshotted
//!    together with its organization. A repository with no open issues yields
//!    a single repository-only record.
//! 2. Each issue is checked against the authoritative target. Unchanged
//!    issues are skipped.
//! 3. Comments in the fetch window are merged into records, followed by one
//!    issue-only record.
//!
//! Every record is keyed and handed to the [`FanoutWriter`] before the next
//! one is produced.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;

use crate::cursor::{Cursor, CursorSnapshot};
use crate::platform::{BudgetCheck, IssueTracker, RateBudget, short_error_message};
use crate::record::{
    Attributes, EventPayload, Record, RepositorySnapshot, id_text, issue_number, open_issues,
    organization_login, repository_full_name,
};
use crate::store::StorageTarget;

use super::change::ChangeDetector;
use super::error::{Result, SyncError};
use super::fanout::{DeliveryReport, FanoutWriter};
use super::progress::{ProgressCallback, SyncProgress, WalkPass, emit};
use super::types::{FETCH_WINDOW_OFFSET_SECS, SyncOptions, WalkStats};

/// Start of the comment fetch window: one second after `reference`.
///
/// A missing reference opens the window at the epoch (fetch everything).
pub fn fetch_window_start(reference: Option<&str>) -> Result<DateTime<Utc>> {
    let Some(reference) = reference else {
        return Ok(DateTime::<Utc>::UNIX_EPOCH);
    };
    let parsed = DateTime::parse_from_rfc3339(reference).map_err(|source| {
        SyncError::InvalidTimestamp {
            value: reference.to_string(),
            source,
        }
    })?;
    Ok(parsed.with_timezone(&Utc) + TimeDelta::seconds(FETCH_WINDOW_OFFSET_SECS))
}

/// How long the polling loop waits after a failed walk.
///
/// An exhausted rate limit waits for its reset plus `options.cooldown_margin`;
/// anything else waits `options.error_delay`.
pub fn failure_delay(error: &SyncError, now: DateTime<Utc>, options: &SyncOptions) -> Duration {
    match error {
        SyncError::Platform(e) => match e.rate_limit_reset() {
            Some(reset_at) => {
                (reset_at - now).to_std().unwrap_or(Duration::ZERO) + options.cooldown_margin
            }
            None => options.error_delay,
        },
        _ => options.error_delay,
    }
}

/// Orchestrates walks and webhook ingestion.
pub struct SyncEngine {
    client: Arc<dyn IssueTracker>,
    writer: FanoutWriter,
    detector: ChangeDetector,
    budget: RateBudget,
    cursor: Option<Cursor>,
    options: SyncOptions,
    on_progress: Option<ProgressCallback>,
}

impl SyncEngine {
    /// Build an engine over `targets`; the first one is authoritative.
    ///
    /// # Errors
    /// Returns [`SyncError::NoTargets`] when `targets` is empty.
    pub fn new(
        client: Arc<dyn IssueTracker>,
        targets: Vec<Arc<dyn StorageTarget>>,
        options: SyncOptions,
    ) -> Result<Self> {
        let authority = targets.first().cloned().ok_or(SyncError::NoTargets)?;

        Ok(Self {
            client,
            writer: FanoutWriter::new(targets, options.fanout_workers),
            detector: ChangeDetector::new(authority),
            budget: RateBudget::new(options.budget_threshold, options.cooldown_margin),
            cursor: None,
            options,
            on_progress: None,
        })
    }

    /// Persist walk progress in `cursor`.
    #[must_use]
    pub fn with_cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn writer(&self) -> &FanoutWriter {
        &self.writer
    }

    fn emit(&self, event: SyncProgress) {
        emit(self.on_progress.as_ref(), event);
    }

    /// One unfiltered walk over every configured repository.
    pub async fn walk(&self) -> Result<WalkStats> {
        self.walk_pass(WalkPass::Full, None).await
    }

    /// Walk, skipping repositories `skip` reports as already walked.
    pub async fn walk_pass(
        &self,
        pass: WalkPass,
        skip: Option<&CursorSnapshot>,
    ) -> Result<WalkStats> {
        let repositories = self
            .client
            .list_repositories(self.options.repositories.as_deref())
            .await?;

        tracing::info!(?pass, repositories = repositories.len(), "Walk started");
        self.emit(SyncProgress::WalkStarted {
            pass,
            repositories: repositories.len(),
        });

        let mut stats = WalkStats::default();
        for repository in repositories {
            let name = repository_full_name(&repository)
                .unwrap_or_default()
                .to_string();

            if let Some(snapshot) = skip
                && snapshot.has(&name)
            {
                tracing::debug!(repository = %name, "Already walked, skipping");
                self.emit(SyncProgress::RepositorySkipped { repository: name });
                continue;
            }

            stats += self.walk_repository(&name, repository).await?;
        }

        tracing::info!(
            ?pass,
            repositories = stats.repositories,
            issues = stats.issues,
            skipped_issues = stats.skipped_issues,
            comments = stats.comments,
            records = stats.records,
            "Walk complete"
        );
        self.emit(SyncProgress::WalkComplete { pass, stats });
        Ok(stats)
    }

    #[tracing::instrument(skip_all, fields(repository = %name))]
    async fn walk_repository(&self, name: &str, repository: Attributes) -> Result<WalkStats> {
        self.emit(SyncProgress::RepositoryStarted {
            repository: name.to_string(),
        });

        let organization = match organization_login(&repository) {
            Some(login) => Some(self.client.get_organization(login).await?),
            None => None,
        };
        let snapshot =
            RepositorySnapshot::new(repository, organization, self.options.key_algorithm);

        let mut stats = WalkStats {
            repositories: 1,
            ..Default::default()
        };

        if open_issues(snapshot.repository()) == Some(0) {
            tracing::debug!("No open issues, storing repository only");
            self.write(snapshot.repository_record()).await;
            stats.records += 1;
        } else {
            stats += self.walk_issues(name, &snapshot).await?;
        }

        if let Some(cursor) = &self.cursor {
            cursor.set(name);
        }

        self.emit(SyncProgress::RepositoryComplete {
            repository: name.to_string(),
            records: stats.records,
        });
        Ok(stats)
    }

    async fn walk_issues(&self, name: &str, snapshot: &RepositorySnapshot) -> Result<WalkStats> {
        self.check_budget().await?;

        let issues = self.client.list_issues(name).await?;
        let mut stats = WalkStats::default();

        for issue in &issues {
            stats.issues += 1;

            let status = self.detector.needs_sync(issue).await?;
            if !status.needs_fetch() {
                stats.skipped_issues += 1;
                self.emit(SyncProgress::IssueUnchanged {
                    repository: name.to_string(),
                    issue_number: issue_number(issue).unwrap_or_default(),
                });
                continue;
            }

            stats += self
                .walk_comments(name, snapshot, issue, status.fetch_reference(issue))
                .await?;
        }

        Ok(stats)
    }

    async fn walk_comments(
        &self,
        name: &str,
        snapshot: &RepositorySnapshot,
        issue: &Attributes,
        reference: Option<&str>,
    ) -> Result<WalkStats> {
        self.check_budget().await?;

        let number = issue_number(issue)
            .ok_or_else(|| SyncError::MissingIssueNumber(id_text(issue).unwrap_or_default()))?;
        let since = fetch_window_start(reference)?;

        let comments = self.client.list_comments(name, number, since).await?;
        tracing::debug!(issue = number, %since, comments = comments.len(), "Fetched comments");
        self.emit(SyncProgress::CommentsFetched {
            repository: name.to_string(),
            issue_number: number,
            count: comments.len(),
        });

        let mut stats = WalkStats {
            comments: comments.len(),
            ..Default::default()
        };
        for comment in &comments {
            self.write(snapshot.comment_record(issue, comment)).await;
            stats.records += 1;
        }

        self.write(snapshot.issue_record(issue)).await;
        stats.records += 1;

        Ok(stats)
    }

    async fn check_budget(&self) -> Result<()> {
        if let BudgetCheck::CooledDown(wait) = self.budget.check_budget(self.client.as_ref()).await? {
            self.emit(SyncProgress::CooledDown { wait });
        }
        Ok(())
    }

    async fn write(&self, record: Record) -> DeliveryReport {
        let report = self.writer.deliver(&record).await;
        for (target, error) in &report.failures {
            self.emit(SyncProgress::DeliveryFailed {
                target: target.clone(),
                record_id: record.id().to_string(),
                error: error.clone(),
            });
        }
        report
    }

    /// Key and deliver a live event, bypassing the walk and change detection.
    pub async fn ingest_event(&self, payload: EventPayload) -> Record {
        let record = Record::from_event(payload, self.options.key_algorithm);
        self.write(record.clone()).await;

        tracing::info!(record_id = %record.id(), "Webhook event stored");
        self.emit(SyncProgress::EventIngested {
            record_id: record.id().to_string(),
        });
        record
    }

    /// Run the polling loop until `shutdown` flips to `true`.
    ///
    /// The first pass skips repositories the cursor (as it was at start-up)
    /// reports as walked; the second pass walks everything; after that full
    /// walks repeat every `poll_interval`. A failed walk waits per
    /// [`failure_delay`].
    pub async fn start(&self, mut shutdown: watch::Receiver<bool>) {
        let mut warm_up = Some(self.cursor.as_ref().map(Cursor::snapshot));

        loop {
            if *shutdown.borrow() {
                break;
            }

            let (pass, skip) = match warm_up.take() {
                Some(Some(snapshot)) if snapshot.covers_all() => {
                    tracing::info!(
                        last = snapshot.last_repository(),
                        "Cursor present, skipping warm-up walk"
                    );
                    continue;
                }
                Some(snapshot) => (WalkPass::WarmUp, snapshot),
                None => (WalkPass::Full, None),
            };

            let outcome = tokio::select! {
                result = self.walk_pass(pass, skip.as_ref()) => result,
                _ = shutdown.changed() => break,
            };

            let delay = match outcome {
                Ok(_) if pass == WalkPass::WarmUp => Duration::ZERO,
                Ok(_) => self.options.poll_interval,
                Err(e) => {
                    let delay = failure_delay(&e, Utc::now(), &self.options);
                    tracing::error!(
                        error = %e,
                        ?pass,
                        retry_in_secs = delay.as_secs(),
                        "Walk failed"
                    );
                    self.emit(SyncProgress::WalkFailed {
                        error: short_error_message(&e),
                    });
                    delay
                }
            };

            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }

        tracing::info!("Sync loop stopped");
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("writer", &self.writer)
            .field("detector", &self.detector)
            .field("budget", &self.budget)
            .field("cursor", &self.cursor)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

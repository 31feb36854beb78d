use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::record::Attributes;

use super::errors::Result;

/// Rate limit information from the tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Maximum requests allowed per period.
    pub limit: usize,
    /// Remaining requests in current period.
    pub remaining: usize,
    /// When the rate limit resets.
    pub reset_at: DateTime<Utc>,
}

/// Trait for issue tracker clients.
///
/// Entities are returned as raw attribute maps so records keep every field
/// the tracker sends, not just the ones this crate understands.
///
/// # Implementation Notes
///
/// Implementors should:
/// - Handle pagination internally for list operations
/// - Convert tracker-specific errors to `PlatformError`
/// - Leave rate budgeting to the caller (see [`RateBudget`](super::RateBudget))
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// Current call budget of the authenticated account.
    async fn get_rate_limit(&self) -> Result<RateLimitInfo>;

    /// Repositories to walk: the named ones (`owner/name`), or every
    /// repository visible to the authenticated account when `names` is `None`.
    async fn list_repositories(&self, names: Option<&[String]>) -> Result<Vec<Attributes>>;

    /// Attributes of an organization.
    async fn get_organization(&self, login: &str) -> Result<Attributes>;

    /// Issues of a repository.
    async fn list_issues(&self, repository: &str) -> Result<Vec<Attributes>>;

    /// Comments of an issue updated after `since`.
    async fn list_comments(
        &self,
        repository: &str,
        issue_number: u64,
        since: DateTime<Utc>,
    ) -> Result<Vec<Attributes>>;
}

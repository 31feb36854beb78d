//! Change detection against the authoritative target.

use std::sync::Arc;

use crate::record::Attributes;
use crate::store::{IssueStatus, StorageTarget};

use super::error::Result;

/// Decides, per issue, whether its comment thread needs fetching.
#[derive(Clone)]
pub struct ChangeDetector {
    authority: Arc<dyn StorageTarget>,
}

impl ChangeDetector {
    pub fn new(authority: Arc<dyn StorageTarget>) -> Self {
        Self { authority }
    }

    /// Name of the target consulted.
    pub fn authority(&self) -> &str {
        self.authority.name()
    }

    /// Ask the authoritative target about `issue`.
    ///
    /// # Errors
    /// Query failures propagate and end the walk iteration.
    pub async fn needs_sync(&self, issue: &Attributes) -> Result<IssueStatus> {
        Ok(self.authority.check_issue_in_db(issue).await?)
    }
}

impl std::fmt::Debug for ChangeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeDetector")
            .field("authority", &self.authority.name())
            .finish()
    }
}

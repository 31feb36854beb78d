//! Storage targets: where records end up.
//!
//! A [`StorageTarget`] accepts records (idempotent upsert keyed by record id)
//! and answers change-detection queries about one issue. The engine treats
//! the first configured target as authoritative; the others only receive
//! writes.

mod errors;
mod memory;
mod mongo;
mod registry;
mod sql;
mod status;

use async_trait::async_trait;

use crate::record::{Attributes, Record};

pub use errors::{Result, StoreError};
pub use memory::MemoryStore;
pub use mongo::{DEFAULT_MONGO_URL, MongoStore};
pub use registry::{TargetSpec, open_targets};
pub use sql::{DEFAULT_TABLE_NAME, SqlStore, connect};
pub use status::{IssueStatus, SyncState};

/// Capability contract every backend implements.
#[async_trait]
pub trait StorageTarget: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Store `record`, replacing any record with the same id.
    async fn insert_message(&self, record: Record) -> Result<()>;

    /// What, if anything, must be fetched for `issue`'s comment thread.
    async fn check_issue_in_db(&self, issue: &Attributes) -> Result<IssueStatus>;
}

//! gitdump: mirror GitHub issue history into durable stores.
//!
//! The [`sync::SyncEngine`] walks repositories, issues and comments through an
//! [`platform::IssueTracker`], turns them into keyed [`record::Record`]s and
//! fans each record out to every configured [`store::StorageTarget`]. The
//! [`server`] module feeds live webhook events through the same path.
//!
//! # Modules
//!
//! - [`key`] - Record deduplication keys
//! - [`record`] - The record model
//! - [`platform`] - Tracker contract, rate budget and request pacing
//! - [`github`] - GitHub REST client
//! - [`store`] - Storage targets (SQL, memory) and the target registry
//! - [`cursor`] - Persistent walk cursor
//! - [`sync`] - Change detection, fan-out and the engine
//! - [`server`] - Webhook listener
//! - [`retry`] - Backoff for transient failures

pub mod cursor;
pub mod github;
pub mod key;
pub mod platform;
pub mod record;
pub mod retry;
pub mod server;
pub mod store;
pub mod sync;

pub use cursor::{Cursor, CursorMode};
pub use github::GitHubClient;
pub use key::{KeyAlgorithm, RecordKey};
pub use platform::{IssueTracker, PlatformError, RateBudget};
pub use record::{Attributes, EventPayload, Record};
pub use store::{IssueStatus, MemoryStore, SqlStore, StorageTarget, StoreError, TargetSpec};
pub use sync::{SyncEngine, SyncError, SyncOptions, WalkStats};

//! Synchronization engine and its collaborators.
//!
//! # Module Structure
//!
//! - [`types`] - `SyncOptions`, `WalkStats`, constants
//! - [`progress`] - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - [`change`] - `ChangeDetector`
//! - [`fanout`] - `FanoutWriter`
//! - [`engine`] - `SyncEngine`: walks and webhook ingestion
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use gitdump::github::GitHubClient;
//! use gitdump::store::MemoryStore;
//! use gitdump::sync::{SyncEngine, SyncOptions};
//!
//! let client = Arc::new(GitHubClient::new(Some(&token))?);
//! let engine = SyncEngine::new(client, vec![Arc::new(MemoryStore::default())], SyncOptions::default())?;
//! let stats = engine.walk().await?;
//! println!("Stored {} records", stats.records);
//! ```

mod change;
pub mod engine;
mod error;
mod fanout;
mod progress;
mod types;

pub use change::ChangeDetector;
pub use engine::{SyncEngine, failure_delay, fetch_window_start};
pub use error::{Result, SyncError};
pub use fanout::{DeliveryReport, FanoutWriter, default_workers};
pub use progress::{ProgressCallback, SyncProgress, WalkPass, emit};
pub use types::{
    DEFAULT_ERROR_DELAY, DEFAULT_POLL_INTERVAL, FETCH_WINDOW_OFFSET_SECS, SyncOptions, WalkStats,
};

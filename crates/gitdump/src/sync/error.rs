use thiserror::Error;

use crate::platform::PlatformError;
use crate::store::StoreError;

/// Errors that end a walk (or prevent the engine from starting).
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Issue has no number: {0}")]
    MissingIssueNumber(String),

    #[error("At least one storage target is required")]
    NoTargets,
}

pub type Result<T> = std::result::Result<T, SyncError>;

use sea_orm::DbErr;
use thiserror::Error;

/// Errors raised by storage targets and the target registry.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("Failed to encode BSON document: {0}")]
    Bson(#[from] mongodb::bson::ser::Error),

    #[error("Invalid target specification '{spec}': {reason}")]
    InvalidSpec { spec: String, reason: String },

    #[error("Unknown store kind: {0}")]
    UnknownKind(String),

    #[error("Target unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid table name: {0}")]
    InvalidTableName(String),
}

impl StoreError {
    pub(crate) fn invalid_spec(spec: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSpec {
            spec: spec.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same operation may succeed.
    ///
    /// SQLite reports lock contention as `database is locked` / `busy`;
    /// Postgres and pool errors surface as connection or timeout failures.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Database(DbErr::ConnectionAcquire(_) | DbErr::Conn(_)) => true,
            Self::Database(err @ (DbErr::Exec(_) | DbErr::Query(_))) => {
                let message = err.to_string().to_lowercase();
                message.contains("locked")
                    || message.contains("busy")
                    || message.contains("timeout")
                    || message.contains("temporarily unavailable")
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

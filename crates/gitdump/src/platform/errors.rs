use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur when talking to the issue tracker.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// API error from the tracker.
    #[error("API error: {message}")]
    Api { message: String },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded. Resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    /// Authentication required or failed.
    #[error("Authentication required")]
    AuthRequired,

    /// Resource not found (repository, organization, issue).
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Network or connection error.
    #[error("Network error: {message}")]
    Network { message: String },

    /// The tracker returned something that is not the expected shape.
    #[error("Unexpected response: {message}")]
    Decode { message: String },
}

impl PlatformError {
    #[inline]
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api {
            message: message.into(),
        }
    }

    #[inline]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    #[inline]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// When the exhausted rate limit resets, for [`PlatformError::RateLimited`].
    pub fn rate_limit_reset(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::RateLimited { reset_at } => Some(*reset_at),
            _ => None,
        }
    }
}

/// First line of an error's message.
///
/// Used for delivery-failure and walk-failure reports, where a multi-line API
/// body would otherwise end up in a progress event.
#[inline]
pub fn short_error_message(e: &impl std::error::Error) -> String {
    let full = e.to_string();
    full.lines().next().unwrap_or(&full).to_string()
}

/// Result type for tracker operations.
pub type Result<T> = std::result::Result<T, PlatformError>;

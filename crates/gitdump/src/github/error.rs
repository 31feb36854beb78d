//! GitHub API error types.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use thiserror::Error;

use crate::platform::PlatformError;

/// Errors that can occur when interacting with the GitHub API.
#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("GitHub API error: {0}")]
    Api(#[from] octocrab::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limit exceeded. Resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("Authentication required")]
    AuthRequired,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unexpected HTTP status {status} for {url}")]
    Status { status: StatusCode, url: String },

    #[error("Unexpected response shape: {0}")]
    Decode(String),
}

/// Check if an octocrab error indicates a rate limit (403/429).
pub fn is_rate_limit_error(e: &octocrab::Error) -> bool {
    match e {
        octocrab::Error::GitHub { source, .. } => {
            let status = source.status_code.as_u16();
            status == 403 || status == 429
        }
        _ => false,
    }
}

fn is_not_found(e: &octocrab::Error) -> bool {
    matches!(e, octocrab::Error::GitHub { source, .. } if source.status_code.as_u16() == 404)
}

impl From<GitHubError> for PlatformError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::RateLimited { reset_at } => PlatformError::RateLimited { reset_at },
            GitHubError::AuthRequired => PlatformError::AuthRequired,
            GitHubError::NotFound(resource) => PlatformError::not_found(resource),
            GitHubError::Api(e) if is_rate_limit_error(&e) => PlatformError::RateLimited {
                reset_at: Utc::now(),
            },
            GitHubError::Api(e) if is_not_found(&e) => PlatformError::not_found(e.to_string()),
            GitHubError::Api(e) => PlatformError::api(e.to_string()),
            GitHubError::Http(e) => PlatformError::network(e.to_string()),
            e @ GitHubError::Status { .. } => PlatformError::api(e.to_string()),
            GitHubError::Decode(message) => PlatformError::decode(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_github_error_to_platform_error() {
        let reset_at = Utc::now();
        assert_eq!(
            PlatformError::from(GitHubError::RateLimited { reset_at }).rate_limit_reset(),
            Some(reset_at)
        );
        assert!(matches!(
            PlatformError::from(GitHubError::AuthRequired),
            PlatformError::AuthRequired
        ));
        assert!(matches!(
            PlatformError::from(GitHubError::NotFound("acme/widgets".into())),
            PlatformError::NotFound { resource } if resource == "acme/widgets"
        ));
        assert!(matches!(
            PlatformError::from(GitHubError::Decode("not an array".into())),
            PlatformError::Decode { .. }
        ));
        assert!(matches!(
            PlatformError::from(GitHubError::Status {
                status: StatusCode::BAD_GATEWAY,
                url: "https://api.github.com/user/repos".into(),
            }),
            PlatformError::Api { message } if message.contains("502")
        ));
    }
}

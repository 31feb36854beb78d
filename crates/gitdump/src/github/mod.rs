//! GitHub REST client.
//!
//! # Module Structure
//!
//! - [`error`] - Error types for GitHub API operations
//! - [`pagination`] - `Link` header parsing
//! - [`client`] - The [`IssueTracker`](crate::platform::IssueTracker) implementation

mod client;
mod error;
mod pagination;

pub use client::{
    DEFAULT_API_URL, GitHubClient, PER_PAGE, SINCE_FORMAT, create_client, parse_rate_limit_headers,
};
pub use error::{GitHubError, is_rate_limit_error};
pub use pagination::{LinkPagination, parse_link_header};

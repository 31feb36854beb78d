use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, LINK, USER_AGENT};
use serde_json::Value;

use crate::platform::{self, ApiRateLimiter, IssueTracker, PlatformError, RateLimitInfo, rate_limits};
use crate::record::Attributes;

use super::error::GitHubError;
use super::pagination::{LinkPagination, parse_link_header};

/// Public GitHub REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Items requested per page on list endpoints (GitHub's maximum).
pub const PER_PAGE: u32 = 100;

/// Format GitHub expects for the `since` query parameter.
pub const SINCE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Build an Octocrab instance for `api_url`, authenticated when a token is given.
pub fn create_client(token: Option<&str>, api_url: &str) -> Result<Octocrab, GitHubError> {
    let mut builder = Octocrab::builder().base_uri(api_url)?;
    if let Some(token) = token {
        builder = builder.personal_token(token.to_string());
    }
    Ok(builder.build()?)
}

/// Extract rate limit info from GitHub response headers.
pub fn parse_rate_limit_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let limit = header("x-ratelimit-limit")?.parse::<usize>().ok()?;
    let remaining = header("x-ratelimit-remaining")?.parse::<usize>().ok()?;
    let reset_epoch = header("x-ratelimit-reset")?.parse::<i64>().ok()?;
    let reset_at = DateTime::from_timestamp(reset_epoch, 0).unwrap_or_else(Utc::now);

    Some(RateLimitInfo {
        limit,
        remaining,
        reset_at,
    })
}

fn into_objects(body: Value, url: &str) -> Result<Vec<Attributes>, GitHubError> {
    let Value::Array(items) = body else {
        return Err(GitHubError::Decode(format!("expected a JSON array from {url}")));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map),
            other => Err(GitHubError::Decode(format!(
                "expected objects from {url}, got {other}"
            ))),
        })
        .collect()
}

/// GitHub REST client implementing [`IssueTracker`].
///
/// Single-resource lookups go through Octocrab; paged list endpoints go
/// through reqwest so the raw JSON (and the `Link` header) is kept intact.
/// Every request first waits on the shared [`ApiRateLimiter`].
#[derive(Clone)]
pub struct GitHubClient {
    inner: Arc<Octocrab>,
    token: Option<Arc<String>>,
    http_client: reqwest::Client,
    api_url: String,
    rate_limiter: ApiRateLimiter,
}

impl GitHubClient {
    /// Create a client for the public API with default pacing.
    pub fn new(token: Option<&str>) -> Result<Self, GitHubError> {
        Self::with_options(token, DEFAULT_API_URL, rate_limits::GITHUB_DEFAULT_RPS)
    }

    /// Create a client for `api_url` (e.g. a GitHub Enterprise endpoint).
    pub fn with_options(
        token: Option<&str>,
        api_url: &str,
        requests_per_second: u32,
    ) -> Result<Self, GitHubError> {
        let api_url = api_url.trim_end_matches('/').to_string();
        let inner = create_client(token, &api_url)?;

        Ok(Self {
            inner: Arc::new(inner),
            token: token.map(|t| Arc::new(t.to_string())),
            http_client: reqwest::Client::new(),
            api_url,
            rate_limiter: ApiRateLimiter::new(requests_per_second),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Get a reference to the inner Octocrab client.
    pub fn inner(&self) -> &Octocrab {
        &self.inner
    }

    pub(crate) fn repositories_url(&self) -> String {
        format!("{}/user/repos?per_page={PER_PAGE}", self.api_url)
    }

    pub(crate) fn issues_url(&self, repository: &str) -> String {
        format!("{}/repos/{repository}/issues?per_page={PER_PAGE}", self.api_url)
    }

    pub(crate) fn comments_url(
        &self,
        repository: &str,
        issue_number: u64,
        since: DateTime<Utc>,
    ) -> String {
        format!(
            "{}/repos/{repository}/issues/{issue_number}/comments?per_page={PER_PAGE}&since={}",
            self.api_url,
            since.format(SINCE_FORMAT)
        )
    }

    /// GET a single JSON object through Octocrab.
    async fn get_object(&self, route: &str) -> Result<Attributes, GitHubError> {
        self.rate_limiter.wait().await;
        let body: Value = self.inner.get(route, None::<&()>).await?;
        match body {
            Value::Object(map) => Ok(map),
            _ => Err(GitHubError::Decode(format!("expected a JSON object from {route}"))),
        }
    }

    /// GET one page of a list endpoint.
    async fn get_page(&self, url: &str) -> Result<(Value, LinkPagination), GitHubError> {
        self.rate_limiter.wait().await;

        let mut request = self
            .http_client
            .get(url)
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, "gitdump");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();

        if status.is_success() {
            let pagination = headers
                .get(LINK)
                .and_then(|v| v.to_str().ok())
                .map(parse_link_header)
                .unwrap_or_default();
            let body: Value = response.json().await?;
            return Ok((body, pagination));
        }

        let rate_limit = parse_rate_limit_headers(&headers);
        match status {
            StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
                if rate_limit.as_ref().is_some_and(|info| info.remaining == 0) =>
            {
                let reset_at = rate_limit.map_or_else(Utc::now, |info| info.reset_at);
                Err(GitHubError::RateLimited { reset_at })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GitHubError::AuthRequired),
            StatusCode::NOT_FOUND => Err(GitHubError::NotFound(url.to_string())),
            _ => Err(GitHubError::Status {
                status,
                url: url.to_string(),
            }),
        }
    }

    /// Fetch every page of a list endpoint, following `rel="next"` links.
    pub async fn get_all(&self, first_url: &str) -> Result<Vec<Attributes>, GitHubError> {
        let mut items = Vec::new();
        let mut next = Some(first_url.to_string());
        let mut pages = 0u32;

        while let Some(url) = next.take() {
            let (body, pagination) = self.get_page(&url).await?;
            items.extend(into_objects(body, &url)?);
            pages += 1;
            next = pagination.next_url;
        }

        tracing::debug!(url = first_url, pages, items = items.len(), "Fetched list");
        Ok(items)
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_url", &self.api_url)
            .field("authenticated", &self.token.is_some())
            .field("rate_limiter", &self.rate_limiter)
            .finish()
    }
}

#[async_trait]
impl IssueTracker for GitHubClient {
    async fn get_rate_limit(&self) -> platform::Result<RateLimitInfo> {
        let rate_limit = self
            .inner
            .ratelimit()
            .get()
            .await
            .map_err(|e| PlatformError::from(GitHubError::Api(e)))?;
        let core = &rate_limit.resources.core;

        Ok(RateLimitInfo {
            limit: core.limit,
            remaining: core.remaining,
            reset_at: DateTime::from_timestamp(core.reset as i64, 0).unwrap_or_else(Utc::now),
        })
    }

    async fn list_repositories(&self, names: Option<&[String]>) -> platform::Result<Vec<Attributes>> {
        let Some(names) = names else {
            return Ok(self.get_all(&self.repositories_url()).await?);
        };

        let mut repositories = Vec::with_capacity(names.len());
        for name in names {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            repositories.push(self.get_object(&format!("/repos/{name}")).await?);
        }
        Ok(repositories)
    }

    async fn get_organization(&self, login: &str) -> platform::Result<Attributes> {
        Ok(self.get_object(&format!("/orgs/{login}")).await?)
    }

    async fn list_issues(&self, repository: &str) -> platform::Result<Vec<Attributes>> {
        Ok(self.get_all(&self.issues_url(repository)).await?)
    }

    async fn list_comments(
        &self,
        repository: &str,
        issue_number: u64,
        since: DateTime<Utc>,
    ) -> platform::Result<Vec<Attributes>> {
        Ok(self
            .get_all(&self.comments_url(repository, issue_number, since))
            .await?)
    }
}

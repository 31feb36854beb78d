//! In-process tracker and storage doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;

use gitdump::Attributes;
use gitdump::platform::{self, IssueTracker, PlatformError, RateLimitInfo};
use gitdump::store::{IssueStatus, StorageTarget, StoreError};
use gitdump::sync::{ProgressCallback, SyncProgress};
use gitdump::Record;

pub fn attrs(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

/// A call made against [`MockTracker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    RateLimit,
    Repositories,
    Organization(String),
    Issues(String),
    Comments {
        repository: String,
        issue_number: u64,
        since: String,
    },
}

/// Scripted issue tracker.
pub struct MockTracker {
    repositories: Vec<Attributes>,
    organizations: HashMap<String, Attributes>,
    issues: HashMap<String, Vec<Attributes>>,
    comments: HashMap<(String, u64), Vec<Attributes>>,
    rate: Mutex<RateLimitInfo>,
    calls: Mutex<Vec<Call>>,
}

impl Default for MockTracker {
    fn default() -> Self {
        Self {
            repositories: Vec::new(),
            organizations: HashMap::new(),
            issues: HashMap::new(),
            comments: HashMap::new(),
            rate: Mutex::new(RateLimitInfo {
                limit: 5000,
                remaining: 5000,
                reset_at: Utc::now() + TimeDelta::hours(1),
            }),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MockTracker {
    pub fn with_repository(mut self, repository: Value) -> Self {
        self.repositories.push(attrs(repository));
        self
    }

    pub fn with_organization(mut self, login: &str, organization: Value) -> Self {
        self.organizations.insert(login.to_string(), attrs(organization));
        self
    }

    pub fn with_issues(mut self, repository: &str, issues: Vec<Value>) -> Self {
        self.issues
            .insert(repository.to_string(), issues.into_iter().map(attrs).collect());
        self
    }

    pub fn with_comments(mut self, repository: &str, issue_number: u64, comments: Vec<Value>) -> Self {
        self.comments.insert(
            (repository.to_string(), issue_number),
            comments.into_iter().map(attrs).collect(),
        );
        self
    }

    pub fn set_remaining(&self, remaining: usize, reset_in: TimeDelta) {
        let mut rate = self.rate.lock().unwrap();
        rate.remaining = remaining;
        rate.reset_at = Utc::now() + reset_in;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl IssueTracker for MockTracker {
    async fn get_rate_limit(&self) -> platform::Result<RateLimitInfo> {
        self.record(Call::RateLimit);
        Ok(self.rate.lock().unwrap().clone())
    }

    async fn list_repositories(&self, names: Option<&[String]>) -> platform::Result<Vec<Attributes>> {
        self.record(Call::Repositories);
        let all = self.repositories.clone();
        Ok(match names {
            None => all,
            Some(names) => all
                .into_iter()
                .filter(|r| {
                    r.get("full_name")
                        .and_then(Value::as_str)
                        .is_some_and(|n| names.iter().any(|want| want == n))
                })
                .collect(),
        })
    }

    async fn get_organization(&self, login: &str) -> platform::Result<Attributes> {
        self.record(Call::Organization(login.to_string()));
        self.organizations
            .get(login)
            .cloned()
            .ok_or_else(|| PlatformError::not_found(login))
    }

    async fn list_issues(&self, repository: &str) -> platform::Result<Vec<Attributes>> {
        self.record(Call::Issues(repository.to_string()));
        Ok(self.issues.get(repository).cloned().unwrap_or_default())
    }

    async fn list_comments(
        &self,
        repository: &str,
        issue_number: u64,
        since: DateTime<Utc>,
    ) -> platform::Result<Vec<Attributes>> {
        self.record(Call::Comments {
            repository: repository.to_string(),
            issue_number,
            since: since.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        });
        let comments = self
            .comments
            .get(&(repository.to_string(), issue_number))
            .cloned()
            .unwrap_or_default();
        Ok(comments
            .into_iter()
            .filter(|c| {
                c.get("updated_at")
                    .and_then(Value::as_str)
                    .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                    .is_none_or(|ts| ts >= since)
            })
            .collect())
    }
}

/// Storage target that rejects every write.
pub struct FailingStore;

#[async_trait]
impl StorageTarget for FailingStore {
    fn name(&self) -> &str {
        "failing"
    }

    async fn insert_message(&self, _record: Record) -> gitdump::store::Result<()> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn check_issue_in_db(&self, _issue: &Attributes) -> gitdump::store::Result<IssueStatus> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

/// Progress callback collecting every event.
pub fn collect_progress() -> (ProgressCallback, Arc<Mutex<Vec<SyncProgress>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let capture = Arc::clone(&events);
    let callback: ProgressCallback = Box::new(move |event| {
        capture.lock().unwrap().push(event);
    });
    (callback, events)
}

pub fn widgets_repository(open_issues: u64) -> Value {
    serde_json::json!({
        "id": 1,
        "full_name": "acme/widgets",
        "updated_at": "2020-01-05T00:00:00Z",
        "open_issues": open_issues,
        "owner": {"login": "acme", "type": "Organization"}
    })
}

pub fn issue_42() -> Value {
    serde_json::json!({
        "id": 42,
        "number": 42,
        "created_at": "2020-01-01T00:00:00Z",
        "updated_at": "2020-01-03T00:00:00Z"
    })
}

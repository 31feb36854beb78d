//! The record model: merged repository/issue/comment snapshots.
//!
//! Walk records are built from a [`RepositorySnapshot`], so a record carrying a
//! comment always carries its issue and repository too. Webhook records are
//! built from an [`EventPayload`] and keep whatever sections the event had.
//!
//! Records are immutable. A changed comment thread yields new records with new
//! keys; nothing ever edits a record after construction.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::key::{KeyAlgorithm, RecordKey};

/// Raw attributes of a repository, organization, issue or comment, exactly as
/// returned by the tracker API.
pub type Attributes = serde_json::Map<String, Value>;

/// The unit of storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    id: RecordKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    repository: Option<Attributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    organization: Option<Attributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    issue: Option<Attributes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    comment: Option<Attributes>,
    /// Other top-level keys of a webhook event (`action`, `sender`, ...).
    #[serde(flatten)]
    extra: Attributes,
}

impl Record {
    fn assemble(
        algorithm: KeyAlgorithm,
        repository: Option<Attributes>,
        organization: Option<Attributes>,
        issue: Option<Attributes>,
        comment: Option<Attributes>,
        extra: Attributes,
    ) -> Self {
        let id = RecordKey::derive(
            algorithm,
            repository.as_ref(),
            issue.as_ref(),
            comment.as_ref(),
        );
        Self {
            id,
            repository,
            organization,
            issue,
            comment,
            extra,
        }
    }

    /// Build a record from a live event, deriving its key.
    ///
    /// Any `id` the sender put in the payload is discarded.
    pub fn from_event(payload: EventPayload, algorithm: KeyAlgorithm) -> Self {
        Self::assemble(
            algorithm,
            payload.repository,
            payload.organization,
            payload.issue,
            payload.comment,
            payload.extra,
        )
    }

    #[inline]
    pub fn id(&self) -> &RecordKey {
        &self.id
    }

    #[inline]
    pub fn repository(&self) -> Option<&Attributes> {
        self.repository.as_ref()
    }

    #[inline]
    pub fn organization(&self) -> Option<&Attributes> {
        self.organization.as_ref()
    }

    #[inline]
    pub fn issue(&self) -> Option<&Attributes> {
        self.issue.as_ref()
    }

    #[inline]
    pub fn comment(&self) -> Option<&Attributes> {
        self.comment.as_ref()
    }

    #[inline]
    pub fn extra(&self) -> &Attributes {
        &self.extra
    }

    /// The embedded issue's id as text, if the record has an issue.
    pub fn issue_id(&self) -> Option<String> {
        self.issue.as_ref().and_then(id_text)
    }

    /// The embedded issue's `updated_at`, if any.
    pub fn issue_updated_at(&self) -> Option<&str> {
        self.issue.as_ref().and_then(|i| str_field(i, "updated_at"))
    }

    /// The timestamp this record contributes to its issue's sync state.
    ///
    /// A comment record contributes the comment's `updated_at`; an issue-only
    /// record contributes the issue's `created_at`.
    pub fn comment_timestamp(&self) -> Option<&str> {
        match &self.comment {
            Some(comment) => str_field(comment, "updated_at"),
            None => self.issue.as_ref().and_then(|i| str_field(i, "created_at")),
        }
    }

    /// Serialize the record to its stored JSON form.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// A decoded webhook event, shaped like a [`Record`] without its key.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventPayload {
    #[serde(default)]
    pub repository: Option<Attributes>,
    #[serde(default)]
    pub organization: Option<Attributes>,
    #[serde(default)]
    pub issue: Option<Attributes>,
    #[serde(default)]
    pub comment: Option<Attributes>,
    /// Captured only so it does not end up in `extra`; never used.
    #[serde(default, rename = "id")]
    _sender_id: Option<Value>,
    #[serde(flatten)]
    pub extra: Attributes,
}

/// A repository (and its organization, when owned by one) captured at the
/// start of its walk. Every walk record for the repository is cut from it.
#[derive(Debug, Clone)]
pub struct RepositorySnapshot {
    repository: Attributes,
    organization: Option<Attributes>,
    algorithm: KeyAlgorithm,
}

impl RepositorySnapshot {
    pub fn new(
        repository: Attributes,
        organization: Option<Attributes>,
        algorithm: KeyAlgorithm,
    ) -> Self {
        Self {
            repository,
            organization,
            algorithm,
        }
    }

    pub fn repository(&self) -> &Attributes {
        &self.repository
    }

    pub fn full_name(&self) -> Option<&str> {
        repository_full_name(&self.repository)
    }

    /// Record holding only repository (and organization) data.
    pub fn repository_record(&self) -> Record {
        self.record(None, None)
    }

    /// Issue record without a comment, the trailer of a comment walk.
    pub fn issue_record(&self, issue: &Attributes) -> Record {
        self.record(Some(issue.clone()), None)
    }

    /// Merged repository + issue + comment record.
    pub fn comment_record(&self, issue: &Attributes, comment: &Attributes) -> Record {
        self.record(Some(issue.clone()), Some(comment.clone()))
    }

    fn record(&self, issue: Option<Attributes>, comment: Option<Attributes>) -> Record {
        Record::assemble(
            self.algorithm,
            Some(self.repository.clone()),
            self.organization.clone(),
            issue,
            comment,
            Attributes::new(),
        )
    }
}

/// Read a string field.
pub fn str_field<'a>(attrs: &'a Attributes, field: &str) -> Option<&'a str> {
    attrs.get(field).and_then(Value::as_str)
}

/// An entity's `id` as text; numeric and string ids compare the same way.
pub fn id_text(attrs: &Attributes) -> Option<String> {
    match attrs.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// `owner/name` of a repository.
pub fn repository_full_name(repository: &Attributes) -> Option<&str> {
    str_field(repository, "full_name")
}

/// Number of open issues, if the repository reports it.
pub fn open_issues(repository: &Attributes) -> Option<u64> {
    repository
        .get("open_issues")
        .or_else(|| repository.get("open_issues_count"))
        .and_then(Value::as_u64)
}

/// Login of the owning organization, when the owner is an organization.
pub fn organization_login(repository: &Attributes) -> Option<&str> {
    let owner = repository.get("owner")?.as_object()?;
    if str_field(owner, "type") == Some("Organization") {
        str_field(owner, "login")
    } else {
        None
    }
}

/// An issue's number within its repository.
pub fn issue_number(issue: &Attributes) -> Option<u64> {
    issue.get("number").and_then(Value::as_u64)
}

use crate::record::{Attributes, str_field};

/// What a storage target last recorded for one issue.
///
/// Both fields are read from the single stored record with the latest comment
/// timestamp, never aggregated across records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    /// `issue.updated_at` of that record.
    pub issue_ts: Option<String>,
    /// Its comment timestamp. Issue-only records contribute the issue's
    /// `created_at`.
    pub comment_ts: Option<String>,
}

/// Whether an issue's comment thread must be (re)fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueStatus {
    /// Nothing stored for the issue: fetch every comment since it was created.
    NotFound,
    /// Stored `updated_at` matches the current one: nothing to fetch.
    Unchanged,
    /// The issue moved on: fetch comments after the stored timestamp.
    ChangedSince(String),
}

impl IssueStatus {
    /// Decide the status of `issue` given the state a target holds for it.
    ///
    /// Every backend funnels through this so they agree on the rule.
    pub fn evaluate(issue: &Attributes, state: Option<&SyncState>) -> Self {
        let Some(state) = state else {
            return Self::NotFound;
        };

        if state.issue_ts.as_deref() == str_field(issue, "updated_at") {
            return Self::Unchanged;
        }

        match state
            .comment_ts
            .as_deref()
            .or_else(|| str_field(issue, "created_at"))
        {
            Some(since) => Self::ChangedSince(since.to_string()),
            None => Self::NotFound,
        }
    }

    /// The `(found, since)` pair form of this status.
    pub fn as_contract(&self) -> (bool, Option<&str>) {
        match self {
            Self::NotFound => (false, None),
            Self::Unchanged => (true, None),
            Self::ChangedSince(since) => (true, Some(since.as_str())),
        }
    }

    /// Timestamp the comment fetch window is anchored on, or `None` to skip.
    pub fn fetch_reference<'a>(&'a self, issue: &'a Attributes) -> Option<&'a str> {
        match self {
            Self::NotFound => str_field(issue, "created_at"),
            Self::Unchanged => None,
            Self::ChangedSince(since) => Some(since),
        }
    }

    #[inline]
    pub fn needs_fetch(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn issue(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_no_state_is_not_found() {
        let issue = issue(json!({"id": 42, "created_at": "2020-01-01T00:00:00Z"}));
        let status = IssueStatus::evaluate(&issue, None);

        assert_eq!(status, IssueStatus::NotFound);
        assert_eq!(status.as_contract(), (false, None));
        assert_eq!(status.fetch_reference(&issue), Some("2020-01-01T00:00:00Z"));
    }

    #[test]
    fn test_matching_issue_timestamp_is_unchanged() {
        let issue = issue(json!({"id": 42, "updated_at": "2020-01-03T00:00:00Z"}));
        let state = SyncState {
            issue_ts: Some("2020-01-03T00:00:00Z".into()),
            comment_ts: Some("2020-01-02T00:00:00Z".into()),
        };
        let status = IssueStatus::evaluate(&issue, Some(&state));

        assert_eq!(status, IssueStatus::Unchanged);
        assert_eq!(status.as_contract(), (true, None));
        assert!(!status.needs_fetch());
        assert_eq!(status.fetch_reference(&issue), None);
    }

    #[test]
    fn test_newer_issue_timestamp_is_changed_since_last_comment() {
        let issue = issue(json!({"id": 42, "updated_at": "2020-02-01T00:00:00Z"}));
        let state = SyncState {
            issue_ts: Some("2020-01-03T00:00:00Z".into()),
            comment_ts: Some("2020-01-02T00:00:00Z".into()),
        };
        let status = IssueStatus::evaluate(&issue, Some(&state));

        assert_eq!(
            status.as_contract(),
            (true, Some("2020-01-02T00:00:00Z"))
        );
        assert_eq!(status.fetch_reference(&issue), Some("2020-01-02T00:00:00Z"));
    }

    #[test]
    fn test_changed_without_comment_timestamp_falls_back_to_created_at() {
        let issue = issue(json!({
            "id": 42,
            "created_at": "2020-01-01T00:00:00Z",
            "updated_at": "2020-02-01T00:00:00Z"
        }));
        let state = SyncState {
            issue_ts: Some("2020-01-03T00:00:00Z".into()),
            comment_ts: None,
        };
        assert_eq!(
            IssueStatus::evaluate(&issue, Some(&state)),
            IssueStatus::ChangedSince("2020-01-01T00:00:00Z".into())
        );
    }
}

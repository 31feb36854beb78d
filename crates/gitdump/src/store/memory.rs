use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::key::RecordKey;
use crate::record::{Attributes, Record, id_text};

use super::errors::Result;
use super::status::{IssueStatus, SyncState};
use super::StorageTarget;

/// Process-local store keyed by record id.
///
/// Useful as a scratch authoritative target and in tests. Contents are lost
/// on exit.
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    records: Mutex<BTreeMap<RecordKey, Record>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn get(&self, id: &RecordKey) -> Option<Record> {
        self.lock().get(id).cloned()
    }

    /// Every stored record, ordered by key.
    pub fn records(&self) -> Vec<Record> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<RecordKey, Record>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn sync_state(&self, issue_id: &str) -> Option<SyncState> {
        let records = self.lock();
        // Option ordering puts None lowest, the same as NULLS LAST on a descending sort.
        let latest = records
            .values()
            .filter(|r| r.issue_id().as_deref() == Some(issue_id))
            .max_by(|a, b| {
                (a.comment_timestamp(), a.issue_updated_at())
                    .cmp(&(b.comment_timestamp(), b.issue_updated_at()))
            })?;

        Some(SyncState {
            issue_ts: latest.issue_updated_at().map(str::to_string),
            comment_ts: latest.comment_timestamp().map(str::to_string),
        })
    }
}

#[async_trait]
impl StorageTarget for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_message(&self, record: Record) -> Result<()> {
        self.lock().insert(record.id().clone(), record);
        Ok(())
    }

    async fn check_issue_in_db(&self, issue: &Attributes) -> Result<IssueStatus> {
        let state = id_text(issue).and_then(|id| self.sync_state(&id));
        Ok(IssueStatus::evaluate(issue, state.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;
    use crate::key::KeyAlgorithm;
    use crate::record::RepositorySnapshot;

    fn attrs(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    fn snapshot() -> RepositorySnapshot {
        RepositorySnapshot::new(
            attrs(json!({"id": 1, "full_name": "acme/widgets", "updated_at": "2020-01-05T00:00:00Z"})),
            None,
            KeyAlgorithm::Sha1,
        )
    }

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let store = MemoryStore::default();
        let issue = attrs(json!({"id": 42, "updated_at": "2020-01-03T00:00:00Z"}));
        let record = snapshot().issue_record(&issue);

        store.insert_message(record.clone()).await.unwrap();
        store.insert_message(record.clone()).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(record.id()), Some(record));
    }

    #[tokio::test]
    async fn test_check_issue_reads_latest_comment_row() {
        let store = MemoryStore::default();
        let issue = attrs(json!({
            "id": 42,
            "created_at": "2020-01-01T00:00:00Z",
            "updated_at": "2020-01-03T00:00:00Z"
        }));
        let early = attrs(json!({"id": 1, "updated_at": "2020-01-02T00:00:00Z"}));
        let late = attrs(json!({"id": 2, "updated_at": "2020-01-02T12:00:00Z"}));

        let snap = snapshot();
        for record in [
            snap.comment_record(&issue, &late),
            snap.comment_record(&issue, &early),
            snap.issue_record(&issue),
        ] {
            store.insert_message(record).await.unwrap();
        }

        let unchanged = store.check_issue_in_db(&issue).await.unwrap();
        assert_eq!(unchanged, IssueStatus::Unchanged);

        let mut newer = issue.clone();
        newer.insert("updated_at".into(), json!("2020-03-01T00:00:00Z"));
        let changed = store.check_issue_in_db(&newer).await.unwrap();
        assert_eq!(
            changed,
            IssueStatus::ChangedSince("2020-01-02T12:00:00Z".into())
        );

        let other = attrs(json!({"id": 7, "updated_at": "2020-01-03T00:00:00Z"}));
        assert_eq!(
            store.check_issue_in_db(&other).await.unwrap(),
            IssueStatus::NotFound
        );
    }

    #[tokio::test]
    async fn test_later_issue_only_record_keeps_comment_position() {
        let store = MemoryStore::default();
        let issue = attrs(json!({
            "id": 42,
            "created_at": "2020-01-01T00:00:00Z",
            "updated_at": "2020-01-03T00:00:00Z"
        }));
        let comment = attrs(json!({"id": 1, "updated_at": "2020-01-02T00:00:00Z"}));
        let mut edited = issue.clone();
        edited.insert("updated_at".into(), json!("2020-01-05T00:00:00Z"));

        let snap = snapshot();
        for record in [
            snap.issue_record(&issue),
            snap.comment_record(&issue, &comment),
            snap.issue_record(&edited),
        ] {
            store.insert_message(record).await.unwrap();
        }

        assert_eq!(
            store.check_issue_in_db(&edited).await.unwrap(),
            IssueStatus::ChangedSince("2020-01-02T00:00:00Z".into())
        );
    }

    #[tokio::test]
    async fn test_repository_only_records_do_not_count_as_issue_state() {
        let store = MemoryStore::default();
        store
            .insert_message(snapshot().repository_record())
            .await
            .unwrap();

        let issue = attrs(json!({"id": 42, "updated_at": "2020-01-03T00:00:00Z"}));
        assert_eq!(
            store.check_issue_in_db(&issue).await.unwrap(),
            IssueStatus::NotFound
        );
    }
}

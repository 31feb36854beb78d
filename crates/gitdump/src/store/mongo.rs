//! MongoDB collection store.
//!
//! Each record is stored as one document shaped like its JSON form and
//! upserted on its `id` field. Change detection reads the issue's document
//! with the latest `comment.updated_at`.

use async_trait::async_trait;
use mongodb::bson::{Bson, Document, doc, to_bson, to_document};
use mongodb::{Client, Collection};
use serde_json::Value;

use crate::record::{Attributes, Record, id_text};

use super::errors::Result;
use super::status::{IssueStatus, SyncState};
use super::StorageTarget;

/// Server used when a spec names none.
pub const DEFAULT_MONGO_URL: &str = "mongodb://localhost:27017";

/// Storage target writing records into one MongoDB collection.
#[derive(Debug, Clone)]
pub struct MongoStore {
    name: String,
    collection: Collection<Document>,
}

impl MongoStore {
    /// Connect to `url` and use `db_name.collection_name`.
    ///
    /// The driver connects lazily; an unreachable server surfaces on the
    /// first read or write.
    pub async fn open(
        name: impl Into<String>,
        url: &str,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self> {
        let client = Client::with_uri_str(url).await?;
        let collection = client.database(db_name).collection(collection_name);
        tracing::debug!(db = db_name, collection = collection_name, "MongoDB store ready");

        Ok(Self {
            name: name.into(),
            collection,
        })
    }

    pub fn collection(&self) -> &Collection<Document> {
        &self.collection
    }
}

/// Filter matching every document of one issue, whether its id was stored as
/// a number or as text.
fn issue_filter(issue: &Attributes) -> Result<Option<Document>> {
    let (Some(raw), Some(text)) = (issue.get("id"), id_text(issue)) else {
        return Ok(None);
    };
    let mut ids = vec![Bson::String(text)];
    if !matches!(raw, Value::String(_)) {
        ids.push(to_bson(raw)?);
    }
    Ok(Some(doc! { "issue.id": { "$in": ids } }))
}

/// Read a stored document's sync timestamps.
fn state_from_document(document: &Document) -> SyncState {
    let issue = document.get_document("issue").ok();
    let issue_field = |field: &str| {
        issue
            .and_then(|i| i.get_str(field).ok())
            .map(str::to_string)
    };

    let comment_ts = document
        .get_document("comment")
        .ok()
        .and_then(|c| c.get_str("updated_at").ok())
        .map(str::to_string)
        .or_else(|| issue_field("created_at"));

    SyncState {
        issue_ts: issue_field("updated_at"),
        comment_ts,
    }
}

#[async_trait]
impl StorageTarget for MongoStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_message(&self, record: Record) -> Result<()> {
        let document = to_document(&record)?;
        self.collection
            .replace_one(doc! { "id": record.id().as_str() }, document)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn check_issue_in_db(&self, issue: &Attributes) -> Result<IssueStatus> {
        let Some(filter) = issue_filter(issue)? else {
            return Ok(IssueStatus::NotFound);
        };

        // Documents without a comment sort last on a descending key.
        let latest = self
            .collection
            .find_one(filter)
            .sort(doc! { "comment.updated_at": -1, "issue.updated_at": -1 })
            .projection(doc! { "_id": 0, "issue": 1, "comment": 1 })
            .await?;

        let state = latest.as_ref().map(state_from_document);
        Ok(IssueStatus::evaluate(issue, state.as_ref()))
    }
}

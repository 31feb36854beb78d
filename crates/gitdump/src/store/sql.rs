//! SQL table store (SQLite or Postgres) built on sea-orm.
//!
//! One row per record:
//!
//! | column       | type | notes                                   |
//! |--------------|------|-----------------------------------------|
//! | `id`         | TEXT | record key, unique                      |
//! | `record`     | TEXT | full record JSON                        |
//! | `issue_id`   | TEXT | NULL for repository-only records        |
//! | `issue_ts`   | TEXT | `issue.updated_at`                      |
//! | `comment_ts` | TEXT | comment `updated_at` or issue `created_at` |

use async_trait::async_trait;
use sea_orm::sea_query::{
    Alias, ColumnDef, Expr, Index, NullOrdering, OnConflict, Order, Query, SelectStatement,
    SimpleExpr, Table,
};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbBackend, DbErr, Statement};

use crate::record::{Attributes, Record, id_text};
use crate::retry::{RetryConfig, with_retry};

use super::errors::{Result, StoreError};
use super::status::{IssueStatus, SyncState};
use super::StorageTarget;

/// Table used when none is configured.
pub const DEFAULT_TABLE_NAME: &str = "github_dump";

const COL_ID: &str = "id";
const COL_RECORD: &str = "record";
const COL_ISSUE_ID: &str = "issue_id";
const COL_ISSUE_TS: &str = "issue_ts";
const COL_COMMENT_TS: &str = "comment_ts";
const COL_HITS: &str = "hits";

/// Configure SQLite pragmas for concurrent writers.
///
/// - `journal_mode=WAL`: readers don't block the writer
/// - `busy_timeout=5000`: wait on locks instead of failing immediately
/// - `synchronous=NORMAL`: safe with WAL, cheaper than FULL
async fn configure_sqlite(db: &DatabaseConnection) -> std::result::Result<(), DbErr> {
    for pragma in [
        "PRAGMA journal_mode=WAL",
        "PRAGMA busy_timeout=5000",
        "PRAGMA synchronous=NORMAL",
    ] {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            pragma.to_string(),
        ))
        .await?;
    }
    Ok(())
}

/// Open a connection, applying SQLite pragmas where relevant.
///
/// # Errors
/// Returns `DbErr` if the connection cannot be established.
pub async fn connect(database_url: &str) -> std::result::Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;
    if db.get_database_backend() == DbBackend::Sqlite {
        configure_sqlite(&db).await?;
    }
    Ok(db)
}

fn validate_table_name(table: &str) -> Result<()> {
    let valid = !table.is_empty()
        && !table.starts_with(|c: char| c.is_ascii_digit())
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidTableName(table.to_string()))
    }
}

/// Timestamps of the row with the latest comment stored for one issue.
///
/// Both columns come from that single row: an issue-only row written later
/// (a webhook edit, say) must not hide comments that were never mirrored.
fn sync_state_query(table: &str, issue_id: &str) -> SelectStatement {
    Query::select()
        .columns([Alias::new(COL_ISSUE_TS), Alias::new(COL_COMMENT_TS)])
        .from(Alias::new(table))
        .and_where(Expr::col(Alias::new(COL_ISSUE_ID)).eq(issue_id))
        .order_by_with_nulls(Alias::new(COL_COMMENT_TS), Order::Desc, NullOrdering::Last)
        .order_by_with_nulls(Alias::new(COL_ISSUE_TS), Order::Desc, NullOrdering::Last)
        .limit(1)
        .to_owned()
}

/// Storage target writing records into a single SQL table.
#[derive(Debug, Clone)]
pub struct SqlStore {
    name: String,
    db: DatabaseConnection,
    table: String,
    retry: RetryConfig,
}

impl SqlStore {
    /// Connect to `database_url` and create the table if it is missing.
    pub async fn open(name: impl Into<String>, database_url: &str, table: &str) -> Result<Self> {
        let db = connect(database_url).await?;
        Self::with_connection(name, db, table).await
    }

    /// Use an existing connection and create the table if it is missing.
    pub async fn with_connection(
        name: impl Into<String>,
        db: DatabaseConnection,
        table: &str,
    ) -> Result<Self> {
        validate_table_name(table)?;
        let store = Self {
            name: name.into(),
            db,
            table: table.to_string(),
            retry: RetryConfig::default(),
        };
        store.create_schema().await?;
        tracing::debug!(store = %store.name, table = %store.table, "SQL store ready");
        Ok(store)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    fn backend(&self) -> DbBackend {
        self.db.get_database_backend()
    }

    fn table_ref(&self) -> Alias {
        Alias::new(self.table.as_str())
    }

    async fn create_schema(&self) -> Result<()> {
        let create = Table::create()
            .table(self.table_ref())
            .if_not_exists()
            .col(ColumnDef::new(Alias::new(COL_ID)).text().not_null().unique_key())
            .col(ColumnDef::new(Alias::new(COL_RECORD)).text().not_null())
            .col(ColumnDef::new(Alias::new(COL_ISSUE_ID)).text().null())
            .col(ColumnDef::new(Alias::new(COL_ISSUE_TS)).text().null())
            .col(ColumnDef::new(Alias::new(COL_COMMENT_TS)).text().null())
            .to_owned();
        self.db.execute(self.backend().build(&create)).await?;

        let index = Index::create()
            .if_not_exists()
            .name(format!("idx_{}_{}", self.table, COL_ISSUE_ID))
            .table(self.table_ref())
            .col(Alias::new(COL_ISSUE_ID))
            .to_owned();
        self.db.execute(self.backend().build(&index)).await?;

        Ok(())
    }

    fn upsert_statement(&self, record: &Record) -> Result<Statement> {
        let json = record.to_json()?;
        let values: [SimpleExpr; 5] = [
            record.id().as_str().into(),
            json.into(),
            record.issue_id().into(),
            record.issue_updated_at().map(str::to_string).into(),
            record.comment_timestamp().map(str::to_string).into(),
        ];
        let insert = Query::insert()
            .into_table(self.table_ref())
            .columns([
                Alias::new(COL_ID),
                Alias::new(COL_RECORD),
                Alias::new(COL_ISSUE_ID),
                Alias::new(COL_ISSUE_TS),
                Alias::new(COL_COMMENT_TS),
            ])
            .values_panic(values)
            .on_conflict(
                OnConflict::column(Alias::new(COL_ID))
                    .update_columns([
                        Alias::new(COL_RECORD),
                        Alias::new(COL_ISSUE_ID),
                        Alias::new(COL_ISSUE_TS),
                        Alias::new(COL_COMMENT_TS),
                    ])
                    .to_owned(),
            )
            .to_owned();
        Ok(self.backend().build(&insert))
    }

    async fn sync_state(&self, issue_id: &str) -> Result<Option<SyncState>> {
        let query = self.backend().build(&sync_state_query(&self.table, issue_id));
        let Some(row) = self.db.query_one(query).await? else {
            return Ok(None);
        };

        Ok(Some(SyncState {
            issue_ts: row.try_get("", COL_ISSUE_TS)?,
            comment_ts: row.try_get("", COL_COMMENT_TS)?,
        }))
    }

    /// Number of stored rows.
    pub async fn count(&self) -> Result<u64> {
        let query = Query::select()
            .expr_as(Expr::col(Alias::new(COL_ID)).count(), Alias::new(COL_HITS))
            .from(self.table_ref())
            .to_owned();
        let row = self.db.query_one(self.backend().build(&query)).await?;
        let hits: i64 = match row {
            Some(row) => row.try_get("", COL_HITS)?,
            None => 0,
        };
        Ok(hits.max(0) as u64)
    }
}

#[async_trait]
impl StorageTarget for SqlStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_message(&self, record: Record) -> Result<()> {
        let statement = self.upsert_statement(&record)?;

        with_retry(
            self.retry.clone(),
            || async {
                self.db
                    .execute(statement.clone())
                    .await
                    .map(|_| ())
                    .map_err(StoreError::from)
            },
            StoreError::is_transient,
            &self.name,
        )
        .await
    }

    async fn check_issue_in_db(&self, issue: &Attributes) -> Result<IssueStatus> {
        let state = match id_text(issue) {
            Some(id) => self.sync_state(&id).await?,
            None => None,
        };
        Ok(IssueStatus::evaluate(issue, state.as_ref()))
    }
}

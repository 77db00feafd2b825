//! Shared local store used by every collection.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use libsql::params::Params;
use libsql::Connection;
use tokio::sync::Mutex;

use super::table::{self, TableRecord};
use super::Database;
use crate::error::{Error, Result};
use crate::models::RecordId;
use crate::protocol::{OpCounts, SnapshotEntry, SyncOp};

/// Thread-safe handle to the local database.
///
/// The single connection behind the mutex is the only serialization point
/// between local edits and sync passes.
#[derive(Clone)]
pub struct LocalStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl LocalStore {
    /// Open the store at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path).await?;
        tracing::debug!("Opened local store at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// All records of a collection, oldest first.
    pub async fn list<T: TableRecord>(&self) -> Result<Vec<T>> {
        let db = self.db.lock().await;
        let sql = format!("{} ORDER BY created_at, id", table::select_sql::<T>());
        query_records(db.connection(), &sql, ()).await
    }

    /// Records whose `column` references `parent`.
    pub async fn list_by<T: TableRecord>(&self, column: &str, parent: RecordId) -> Result<Vec<T>> {
        if !T::COLUMNS.contains(&column) {
            return Err(Error::InvalidInput(format!(
                "{} has no column `{column}`",
                T::TABLE
            )));
        }
        let db = self.db.lock().await;
        let sql = format!(
            "{} WHERE {column} = ?1 ORDER BY created_at, id",
            table::select_sql::<T>()
        );
        query_records(db.connection(), &sql, libsql::params![parent.as_str()]).await
    }

    pub async fn get<T: TableRecord>(&self, id: RecordId) -> Result<Option<T>> {
        let db = self.db.lock().await;
        fetch_one(db.connection(), id).await
    }

    pub async fn count<T: TableRecord>(&self) -> Result<u64> {
        let db = self.db.lock().await;
        let sql = format!("SELECT COUNT(*) FROM {}", T::TABLE);
        let mut rows = db.connection().query(&sql, ()).await?;
        let count = match rows.next().await? {
            Some(row) => table::get_i64(&row, 0)?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or_default())
    }

    /// `(id, updatedAt)` of every local record.
    pub async fn snapshot<T: TableRecord>(&self) -> Result<Vec<SnapshotEntry>> {
        let db = self.db.lock().await;
        let sql = format!("SELECT id, updated_at FROM {} ORDER BY id", T::TABLE);
        let mut rows = db.connection().query(&sql, ()).await?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next().await? {
            entries.push(SnapshotEntry {
                id: table::get_id(&row, 0)?,
                updated_at: table::get_timestamp(&row, 1)?,
            });
        }
        Ok(entries)
    }

    pub async fn insert<T: TableRecord>(&self, record: &T) -> Result<()> {
        let db = self.db.lock().await;
        db.connection()
            .execute(&table::insert_sql::<T>(), positional(record)?)
            .await?;
        Ok(())
    }

    pub async fn update<T: TableRecord>(&self, record: &T) -> Result<()> {
        let db = self.db.lock().await;
        let changed = db
            .connection()
            .execute(&table::update_sql::<T>(), positional(record)?)
            .await?;
        if changed == 0 {
            return Err(not_found::<T>(record.id()));
        }
        Ok(())
    }

    pub async fn delete<T: TableRecord>(&self, id: RecordId) -> Result<()> {
        let db = self.db.lock().await;
        let sql = format!("DELETE FROM {} WHERE id = ?1", T::TABLE);
        let changed = db
            .connection()
            .execute(&sql, libsql::params![id.as_str()])
            .await?;
        if changed == 0 {
            return Err(not_found::<T>(id));
        }
        Ok(())
    }

    /// Apply a batch of sync ops in one transaction.
    ///
    /// Inserts and updates are upserted after merging with any existing local
    /// copy. Any failure rolls the whole batch back.
    pub async fn apply<T: TableRecord>(&self, ops: Vec<SyncOp<T>>) -> Result<OpCounts> {
        let db = self.db.lock().await;
        let conn = db.connection();

        conn.execute("BEGIN TRANSACTION", ()).await?;

        let counts = match apply_ops(conn, ops).await {
            Ok(counts) => counts,
            Err(e) => {
                conn.execute("ROLLBACK", ()).await.ok();
                return Err(e);
            }
        };

        if let Err(e) = conn.execute("COMMIT", ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }

        Ok(counts)
    }
}

async fn apply_ops<T: TableRecord>(conn: &Connection, ops: Vec<SyncOp<T>>) -> Result<OpCounts> {
    let mut counts = OpCounts::default();
    let upsert = table::upsert_sql::<T>();
    let delete = format!("DELETE FROM {} WHERE id = ?1", T::TABLE);

    for op in ops {
        match op {
            SyncOp::Insert(record) => {
                let local = fetch_one::<T>(conn, record.id()).await?;
                let merged = T::merge_incoming(record, local.as_ref());
                conn.execute(&upsert, positional(&merged)?).await?;
                counts.inserted += 1;
            }
            SyncOp::Update(record) => {
                let local = fetch_one::<T>(conn, record.id()).await?;
                if local.is_none() {
                    tracing::warn!(
                        entity = %T::KIND,
                        id = %record.id(),
                        "Update for a record missing locally; inserting it"
                    );
                }
                let merged = T::merge_incoming(record, local.as_ref());
                conn.execute(&upsert, positional(&merged)?).await?;
                counts.updated += 1;
            }
            SyncOp::Delete(id) => {
                let changed = conn.execute(&delete, libsql::params![id.as_str()]).await?;
                if changed == 0 {
                    tracing::debug!(entity = %T::KIND, %id, "Delete for a record already gone");
                }
                counts.deleted += 1;
            }
        }
    }

    Ok(counts)
}

async fn fetch_one<T: TableRecord>(conn: &Connection, id: RecordId) -> Result<Option<T>> {
    let sql = format!("{} WHERE id = ?1", table::select_sql::<T>());
    let mut records = query_records(conn, &sql, libsql::params![id.as_str()]).await?;
    Ok(records.pop())
}

async fn query_records<T: TableRecord>(
    conn: &Connection,
    sql: &str,
    params: impl libsql::params::IntoParams,
) -> Result<Vec<T>> {
    let mut rows = conn.query(sql, params).await?;
    let mut records = Vec::new();
    while let Some(row) = rows.next().await? {
        records.push(T::from_row(&row)?);
    }
    Ok(records)
}

fn positional<T: TableRecord>(record: &T) -> Result<Params> {
    Ok(Params::Positional(record.to_values()?))
}

fn not_found<T: TableRecord>(id: RecordId) -> Error {
    Error::NotFound(format!("{} {id}", T::KIND))
}

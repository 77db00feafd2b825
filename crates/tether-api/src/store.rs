//! Owner-scoped server storage on libSQL.
//!
//! Rows use the same column layout as the client tables plus an `owner_id`
//! column. Chat messages carry no owner of their own and are scoped through
//! their chat.

use std::path::Path;
use std::sync::Arc;

use libsql::{Builder, Connection, Value};
use tether_core::db::migrations;
use tether_core::db::table::{column_list, id_value, insert_sql, placeholders, select_sql, update_sql};
use tether_core::db::TableRecord;
use tether_core::models::{Chat, ChatMessage, Connection as DbConnection, RecordId, SavedQuery};
use tether_core::util::{now_millis, user_fingerprint};
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::secrets::{self, SecretError};

/// Server schema, oldest first.
const MIGRATIONS: [&[&str]; 2] = [&V1, &V2];

const V1: [&str; 6] = [
    "CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        secret TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS connections (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        connection_string TEXT NOT NULL,
        label TEXT,
        color TEXT,
        sync_type TEXT NOT NULL,
        is_password_exists INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE
    )",
    "CREATE TABLE IF NOT EXISTS queries (
        id TEXT PRIMARY KEY,
        connection_id TEXT NOT NULL,
        name TEXT NOT NULL,
        query TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE
    )",
    "CREATE TABLE IF NOT EXISTS chats (
        id TEXT PRIMARY KEY,
        connection_id TEXT NOT NULL,
        title TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL,
        owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE
    )",
    "CREATE TABLE IF NOT EXISTS chat_messages (
        id TEXT PRIMARY KEY,
        chat_id TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
        role TEXT NOT NULL,
        parts TEXT NOT NULL,
        metadata TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
];

const V2: [&str; 4] = [
    "CREATE INDEX IF NOT EXISTS idx_connections_owner ON connections(owner_id)",
    "CREATE INDEX IF NOT EXISTS idx_queries_owner ON queries(owner_id)",
    "CREATE INDEX IF NOT EXISTS idx_chats_owner ON chats(owner_id)",
    "CREATE INDEX IF NOT EXISTS idx_chat_messages_chat ON chat_messages(chat_id)",
];

/// How a table's rows are tied to their owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The row has an `owner_id` column.
    Column,
    /// The row belongs to whoever owns the parent row it references.
    Parent {
        column: &'static str,
        table: &'static str,
    },
}

/// A synced record as the server stores it.
pub trait ServerRecord: TableRecord {
    const OWNERSHIP: Ownership;

    /// Parent row id for [`Ownership::Parent`] records.
    fn parent_id(&self) -> Option<RecordId> {
        None
    }

    /// Encrypt secret fields before they are written.
    fn seal(self, _secret: &str) -> Result<Self, SecretError> {
        Ok(self)
    }

    /// Decrypt secret fields before they leave the server.
    fn unveil(self, _secret: &str) -> Result<Self, SecretError> {
        Ok(self)
    }
}

impl ServerRecord for DbConnection {
    const OWNERSHIP: Ownership = Ownership::Column;

    fn seal(mut self, secret: &str) -> Result<Self, SecretError> {
        self.connection_string = secrets::seal(&self.connection_string, secret)?;
        Ok(self)
    }

    fn unveil(mut self, secret: &str) -> Result<Self, SecretError> {
        self.connection_string = secrets::unveil(&self.connection_string, secret)?;
        Ok(self)
    }
}

impl ServerRecord for SavedQuery {
    const OWNERSHIP: Ownership = Ownership::Column;
}

impl ServerRecord for Chat {
    const OWNERSHIP: Ownership = Ownership::Column;
}

impl ServerRecord for ChatMessage {
    const OWNERSHIP: Ownership = Ownership::Parent {
        column: "chat_id",
        table: "chats",
    };

    fn parent_id(&self) -> Option<RecordId> {
        Some(self.chat_id)
    }
}

struct ServerDb {
    _db: libsql::Database,
    conn: Connection,
}

#[derive(Clone)]
pub struct ServerStore {
    db: Arc<Mutex<ServerDb>>,
}

impl ServerStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_string_lossy().to_string();
        let db = Builder::new_local(&path).build().await?;
        Self::from_libsql(db).await
    }

    pub async fn open_in_memory() -> Result<Self, AppError> {
        let db = Builder::new_local(":memory:").build().await?;
        Self::from_libsql(db).await
    }

    async fn from_libsql(db: libsql::Database) -> Result<Self, AppError> {
        let conn = db.connect()?;
        conn.query("PRAGMA journal_mode = WAL;", ()).await.ok();
        conn.execute("PRAGMA foreign_keys = ON;", ()).await?;

        migrations::migrate(&conn, &MIGRATIONS).await?;

        Ok(Self {
            db: Arc::new(Mutex::new(ServerDb { _db: db, conn })),
        })
    }

    /// Register `user_id` with a fresh secret; an existing user keeps theirs.
    pub async fn provision_user(&self, user_id: &str) -> Result<(), AppError> {
        let db = self.db.lock().await;
        let inserted = db
            .conn
            .execute(
                "INSERT INTO users (id, secret, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO NOTHING",
                libsql::params![
                    user_id,
                    secrets::generate_user_secret(),
                    now_millis().timestamp_millis()
                ],
            )
            .await?;
        if inserted > 0 {
            tracing::info!(user = user_fingerprint(user_id), "Provisioned user");
        }
        Ok(())
    }

    /// The owner's sealing secret. Unknown owners are unauthorized.
    pub async fn user_secret(&self, user_id: &str) -> Result<String, AppError> {
        let db = self.db.lock().await;
        let mut rows = db
            .conn
            .query(
                "SELECT secret FROM users WHERE id = ?1",
                libsql::params![user_id],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<String>(0)?),
            None => Err(AppError::unauthorized("Unknown user")),
        }
    }

    /// Every record of `T` owned by `owner`, as stored (secrets sealed).
    pub async fn records<T: ServerRecord>(&self, owner: &str) -> Result<Vec<T>, AppError> {
        let db = self.db.lock().await;
        let mut rows = db
            .conn
            .query(&list_sql::<T>(), libsql::params![owner])
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(T::from_row(&row)?);
        }
        Ok(records)
    }

    /// Insert `record` for `owner`. A repeated id is a no-op.
    pub async fn create<T: ServerRecord>(&self, owner: &str, record: &T) -> Result<bool, AppError> {
        let db = self.db.lock().await;
        ensure_parent_owned(&db.conn, owner, record).await?;

        let mut values = record.to_values()?;
        if T::OWNERSHIP == Ownership::Column {
            values.push(Value::Text(owner.to_string()));
        }
        let inserted = db
            .conn
            .execute(&create_sql::<T>(), libsql::params::Params::Positional(values))
            .await?;
        Ok(inserted > 0)
    }

    /// Overwrite an owned record. Missing or foreign ids are not found.
    pub async fn update<T: ServerRecord>(&self, owner: &str, record: &T) -> Result<(), AppError> {
        let db = self.db.lock().await;
        ensure_parent_owned(&db.conn, owner, record).await?;

        let mut values = record.to_values()?;
        values.push(Value::Text(owner.to_string()));
        let updated = db
            .conn
            .execute(
                &update_owned_sql::<T>(),
                libsql::params::Params::Positional(values),
            )
            .await?;
        if updated == 0 {
            return Err(AppError::not_found(format!(
                "{} {}",
                T::KIND,
                record.id()
            )));
        }
        Ok(())
    }

    /// Delete owned records by id; unknown ids are ignored.
    pub async fn remove<T: ServerRecord>(&self, owner: &str, ids: &[RecordId]) -> Result<u64, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }

        let db = self.db.lock().await;
        let mut values: Vec<Value> = ids.iter().copied().map(id_value).collect();
        values.push(Value::Text(owner.to_string()));
        let removed = db
            .conn
            .execute(
                &remove_sql::<T>(ids.len()),
                libsql::params::Params::Positional(values),
            )
            .await?;
        Ok(removed)
    }
}

/// Stamp a fresh `updatedAt` before an update is stored.
pub fn stamp<T: ServerRecord>(mut record: T) -> T {
    record.touch(now_millis());
    record
}

async fn ensure_parent_owned<T: ServerRecord>(
    conn: &Connection,
    owner: &str,
    record: &T,
) -> Result<(), AppError> {
    let Ownership::Parent { table, .. } = T::OWNERSHIP else {
        return Ok(());
    };
    let Some(parent_id) = record.parent_id() else {
        return Ok(());
    };

    let mut rows = conn
        .query(
            &format!("SELECT 1 FROM {table} WHERE id = ?1 AND owner_id = ?2"),
            libsql::params![parent_id.as_str(), owner],
        )
        .await?;
    if rows.next().await?.is_none() {
        return Err(AppError::not_found(format!("{table} {parent_id}")));
    }
    Ok(())
}

fn owner_filter<T: ServerRecord>(param: usize) -> String {
    match T::OWNERSHIP {
        Ownership::Column => format!("owner_id = ?{param}"),
        Ownership::Parent { column, table } => {
            format!("{column} IN (SELECT id FROM {table} WHERE owner_id = ?{param})")
        }
    }
}

fn list_sql<T: ServerRecord>() -> String {
    format!("{} WHERE {} ORDER BY id", select_sql::<T>(), owner_filter::<T>(1))
}

fn create_sql<T: ServerRecord>() -> String {
    match T::OWNERSHIP {
        Ownership::Column => format!(
            "INSERT INTO {} ({}, owner_id) VALUES ({}) ON CONFLICT(id) DO NOTHING",
            T::TABLE,
            column_list::<T>(),
            placeholders(T::COLUMNS.len() + 1, 0)
        ),
        Ownership::Parent { .. } => format!("{} ON CONFLICT(id) DO NOTHING", insert_sql::<T>()),
    }
}

fn update_owned_sql<T: ServerRecord>() -> String {
    format!(
        "{} AND {}",
        update_sql::<T>(),
        owner_filter::<T>(T::COLUMNS.len() + 1)
    )
}

fn remove_sql<T: ServerRecord>(count: usize) -> String {
    format!(
        "DELETE FROM {} WHERE id IN ({}) AND {}",
        T::TABLE,
        placeholders(count, 0),
        owner_filter::<T>(count + 1)
    )
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tether_core::models::{DatabaseKind, MessageRole, SyncableRecord};

    use super::*;

    async fn store_with_users() -> ServerStore {
        let store = ServerStore::open_in_memory().await.unwrap();
        store.provision_user("alice").await.unwrap();
        store.provision_user("bob").await.unwrap();
        store
    }

    #[test]
    fn scoped_sql_shapes() {
        assert_eq!(
            remove_sql::<Chat>(2),
            "DELETE FROM chats WHERE id IN (?1, ?2) AND owner_id = ?3"
        );
        assert_eq!(
            remove_sql::<ChatMessage>(1),
            "DELETE FROM chat_messages WHERE id IN (?1) AND chat_id IN (SELECT id FROM chats WHERE owner_id = ?2)"
        );
        assert!(create_sql::<SavedQuery>().contains("owner_id) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"));
        assert!(update_owned_sql::<SavedQuery>().ends_with("WHERE id = ?1 AND owner_id = ?7"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn provisioning_is_idempotent_and_unknown_users_are_rejected() {
        let store = store_with_users().await;
        let secret = store.user_secret("alice").await.unwrap();
        store.provision_user("alice").await.unwrap();
        assert_eq!(store.user_secret("alice").await.unwrap(), secret);

        assert!(matches!(
            store.user_secret("mallory").await,
            Err(AppError::Unauthorized(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn records_are_scoped_to_their_owner() {
        let store = store_with_users().await;
        let query = SavedQuery::new(RecordId::new(), "Top users", "SELECT 1");
        assert!(store.create("alice", &query).await.unwrap());
        assert!(!store.create("alice", &query).await.unwrap());

        assert_eq!(store.records::<SavedQuery>("alice").await.unwrap(), vec![query.clone()]);
        assert!(store.records::<SavedQuery>("bob").await.unwrap().is_empty());

        assert!(matches!(
            store.update("bob", &query).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(store.remove::<SavedQuery>("bob", &[query.id]).await.unwrap(), 0);
        assert_eq!(store.remove::<SavedQuery>("alice", &[query.id, RecordId::new()]).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn messages_follow_their_chat_owner_and_cascade() {
        let store = store_with_users().await;
        let chat = Chat::new(RecordId::new(), Some("Schema questions".to_string()));
        store.create("alice", &chat).await.unwrap();

        let message = ChatMessage::new(chat.id, MessageRole::User, json!([{"type": "text", "text": "hi"}]));
        assert!(matches!(
            store.create("bob", &message).await,
            Err(AppError::NotFound(_))
        ));
        store.create("alice", &message).await.unwrap();
        assert_eq!(store.records::<ChatMessage>("alice").await.unwrap().len(), 1);
        assert!(store.records::<ChatMessage>("bob").await.unwrap().is_empty());

        store.remove::<Chat>("alice", &[chat.id]).await.unwrap();
        assert!(store.records::<ChatMessage>("alice").await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_stamps_and_overwrites() {
        let store = store_with_users().await;
        let chat = Chat::new(RecordId::new(), None);
        store.create("alice", &chat).await.unwrap();

        let mut edited = chat.clone();
        edited.title = Some("Renamed".to_string());
        let edited = stamp(edited);
        store.update("alice", &edited).await.unwrap();

        let stored = store.records::<Chat>("alice").await.unwrap();
        assert_eq!(stored[0].title.as_deref(), Some("Renamed"));
        assert!(stored[0].updated_at() >= chat.updated_at());
    }

    #[test]
    fn connection_seal_roundtrip() {
        let connection = DbConnection::new("prod", DatabaseKind::Postgres, "postgres://u:p@h/db");
        let sealed = connection.clone().seal("secret").unwrap();
        assert_ne!(sealed.connection_string, connection.connection_string);
        assert_eq!(sealed.unveil("secret").unwrap(), connection);
    }
}

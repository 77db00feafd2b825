//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Client schema, oldest first.
const MIGRATIONS: [&[&str]; 2] = [&V1, &V2];

/// Run all pending client migrations
pub async fn run(conn: &Connection) -> Result<()> {
    migrate(conn, &MIGRATIONS).await
}

/// Apply every migration newer than the recorded schema version.
///
/// Versions are the 1-based positions in `migrations`; the first one must
/// create the `schema_version` table.
pub async fn migrate(conn: &Connection, migrations: &[&[&str]]) -> Result<()> {
    let current = schema_version(conn).await?;
    let mut applied = current;
    for (version, statements) in (1..).zip(migrations) {
        if version > current {
            apply(conn, version, statements).await?;
            applied = version;
        }
    }

    if applied > current {
        tracing::info!("Migrated database from version {current} to {applied}");
    }
    Ok(())
}

/// Initial schema: one table per synced collection.
///
/// `chat_messages.chat_id` is a hard foreign key; queries and chats only
/// hold soft references to their connection.
const V1: [&str; 5] = [
    "CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS connections (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        kind TEXT NOT NULL,
        connection_string TEXT NOT NULL,
        label TEXT,
        color TEXT,
        sync_type TEXT NOT NULL DEFAULT 'cloud_without_password',
        is_password_exists INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS queries (
        id TEXT PRIMARY KEY,
        connection_id TEXT NOT NULL,
        name TEXT NOT NULL,
        query TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS chats (
        id TEXT PRIMARY KEY,
        connection_id TEXT NOT NULL,
        title TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
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

/// Lookup indexes for per-parent listings.
const V2: [&str; 3] = [
    "CREATE INDEX IF NOT EXISTS idx_queries_connection ON queries(connection_id)",
    "CREATE INDEX IF NOT EXISTS idx_chats_connection ON chats(connection_id)",
    "CREATE INDEX IF NOT EXISTS idx_chat_messages_chat ON chat_messages(chat_id, created_at)",
];

/// Get the current schema version
pub async fn schema_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists = match rows.next().await? {
        Some(row) => row.get::<i32>(0)? != 0,
        None => false,
    };
    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;
    match rows.next().await? {
        Some(row) => Ok(row.get(0)?),
        None => Ok(0),
    }
}

/// Run one migration's statements inside a single transaction and record
/// `version` on success.
async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    if let Err(error) = apply_statements(conn, version, statements).await {
        conn.execute("ROLLBACK", ()).await.ok();
        tracing::warn!(version, "Migration failed: {error}");
        return Err(error);
    }

    tracing::debug!("Applied migration {version}");
    Ok(())
}

async fn apply_statements(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    for statement in statements {
        conn.execute(statement, ()).await?;
    }
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        libsql::params![version],
    )
    .await?;
    conn.execute("COMMIT", ()).await?;
    Ok(())
}

//! Database module
//!
//! SQLite pool setup and the idempotent schema guard shared by the event log
//! and the author aggregate store.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{SqliteConnection, SqlitePool};

const CREATE_EVENTS: &str = r#"
    CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        message TEXT NOT NULL,
        author TEXT NOT NULL CHECK (length(trim(author)) > 0),
        timestamp TEXT NOT NULL,
        category TEXT NOT NULL,
        sentiment REAL NOT NULL,
        keyword_mentioned TEXT NOT NULL,
        message_length INTEGER NOT NULL CHECK (message_length >= 0)
    )
"#;

const CREATE_EVENTS_AUTHOR_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_events_author ON events(author, id)";

const CREATE_AUTHOR_AGGREGATE: &str = r#"
    CREATE TABLE IF NOT EXISTS author_aggregate (
        author TEXT PRIMARY KEY,
        average_sentiment REAL NOT NULL,
        event_count INTEGER NOT NULL CHECK (event_count >= 1)
    )
"#;

/// Open a pool against `database_url`, creating the database file if needed
pub async fn connect(
    database_url: &str,
    max_connections: u32,
    timeout: Duration,
) -> Result<SqlitePool, sqlx::Error> {
    let mut options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .busy_timeout(timeout);

    let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
    if !in_memory {
        options = options.journal_mode(SqliteJournalMode::Wal);
        if let Some(parent) = database_path(database_url).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
    }

    let mut pool_options = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(timeout);

    // An in-memory database lives only as long as its connection
    if in_memory {
        pool_options = pool_options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    pool_options.connect_with(options).await
}

/// File path portion of a `sqlite:` URL
fn database_path(database_url: &str) -> &Path {
    let without_scheme = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);
    let path = without_scheme.split('?').next().unwrap_or(without_scheme);
    Path::new(path)
}

/// Simple connectivity check
pub async fn verify_connection(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Ensure the event log table and its author index exist
pub async fn ensure_event_log(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_EVENTS).execute(&mut *conn).await?;
    sqlx::query(CREATE_EVENTS_AUTHOR_INDEX)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Ensure the author aggregate table exists
pub async fn ensure_author_aggregate(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(CREATE_AUTHOR_AGGREGATE)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Ensure both tables exist. Never drops or alters existing rows.
pub async fn ensure_schema(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    ensure_event_log(conn).await?;
    ensure_author_aggregate(conn).await
}

/// Drop and recreate both tables.
///
/// Destroys every stored event and aggregate. Only reachable from the
/// explicit `reset` admin command.
pub async fn reset(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DROP TABLE IF EXISTS author_aggregate")
        .execute(&mut *tx)
        .await?;
    sqlx::query("DROP TABLE IF EXISTS events")
        .execute(&mut *tx)
        .await?;
    ensure_schema(&mut *tx).await?;

    tx.commit().await?;

    tracing::warn!("Event log and author aggregates were reset");
    Ok(())
}

/// Which of the two tables currently exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaStatus {
    pub events: bool,
    pub author_aggregate: bool,
}

impl SchemaStatus {
    pub fn is_complete(&self) -> bool {
        self.events && self.author_aggregate
    }
}

/// Check which tables exist, without creating anything
pub async fn check_schema(pool: &SqlitePool) -> Result<SchemaStatus, sqlx::Error> {
    let mut status = SchemaStatus {
        events: false,
        author_aggregate: false,
    };

    for table in ["events", "author_aggregate"] {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        match table {
            "events" => status.events = exists,
            _ => status.author_aggregate = exists,
        }
    }

    Ok(status)
}

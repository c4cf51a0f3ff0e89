//! Event Log Repository
//!
//! Append-only storage of raw events. Ingestion only ever appends; deletion is
//! an administrative path. Full scans are for repair and verification, never
//! for the per-event hot path.

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::db;
use crate::domain::{NewEvent, StoredEvent};

use super::StoreError;

type EventRow = (i64, String, String, String, String, f64, String, i64);

const SELECT_EVENT: &str = r#"
    SELECT id, message, author, timestamp, category, sentiment, keyword_mentioned, message_length
    FROM events
"#;

fn row_to_event(row: EventRow) -> StoredEvent {
    let (id, message, author, timestamp, category, sentiment, keyword_mentioned, message_length) =
        row;
    StoredEvent {
        id,
        message,
        author,
        timestamp,
        category,
        sentiment,
        keyword_mentioned,
        message_length,
    }
}

/// Durable event log
#[derive(Debug, Clone)]
pub struct EventLog {
    pool: SqlitePool,
}

impl EventLog {
    /// Create a new EventLog with a database pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Ensure the events table exists. Safe to call any number of times.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        self.conn().await?;
        Ok(())
    }

    /// Acquire a connection with the events table guaranteed to exist
    async fn conn(&self) -> Result<PoolConnection<Sqlite>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        db::ensure_event_log(&mut *conn).await?;
        Ok(conn)
    }

    /// Append one event and return its assigned id
    pub async fn append(&self, event: &NewEvent) -> Result<i64, StoreError> {
        let mut conn = self.conn().await?;
        Self::append_in(&mut *conn, event).await
    }

    /// Append inside a caller-owned connection or transaction
    pub(crate) async fn append_in(
        conn: &mut SqliteConnection,
        event: &NewEvent,
    ) -> Result<i64, StoreError> {
        let id = sqlx::query(
            r#"
            INSERT INTO events (
                message, author, timestamp, category,
                sentiment, keyword_mentioned, message_length
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&event.message)
        .bind(&event.author)
        .bind(&event.timestamp)
        .bind(&event.category)
        .bind(event.sentiment)
        .bind(&event.keyword_mentioned)
        .bind(event.message_length)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

        Ok(id)
    }

    /// Get one event by id
    pub async fn get(&self, id: i64) -> Result<Option<StoredEvent>, StoreError> {
        let mut conn = self.conn().await?;
        Self::get_in(&mut *conn, id).await
    }

    async fn get_in(
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<Option<StoredEvent>, StoreError> {
        let row: Option<EventRow> = sqlx::query_as(&format!("{SELECT_EVENT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(row.map(row_to_event))
    }

    /// Delete one event by id.
    ///
    /// This touches the log only; the author's aggregate is left as it was.
    /// Use the admin handler's `delete_event` to keep both consistent.
    pub async fn delete(&self, id: i64) -> Result<StoredEvent, StoreError> {
        let mut conn = self.conn().await?;
        Self::delete_in(&mut *conn, id).await
    }

    pub(crate) async fn delete_in(
        conn: &mut SqliteConnection,
        id: i64,
    ) -> Result<StoredEvent, StoreError> {
        let event = Self::get_in(conn, id)
            .await?
            .ok_or(StoreError::EventNotFound(id))?;

        sqlx::query("DELETE FROM events WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        tracing::info!(event_id = id, author = %event.author, "Deleted event");
        Ok(event)
    }

    /// All events for an author, in append order
    pub async fn scan_by_author(&self, author: &str) -> Result<Vec<StoredEvent>, StoreError> {
        let mut conn = self.conn().await?;
        let rows: Vec<EventRow> =
            sqlx::query_as(&format!("{SELECT_EVENT} WHERE author = ?1 ORDER BY id ASC"))
                .bind(author)
                .fetch_all(&mut *conn)
                .await?;

        Ok(rows.into_iter().map(row_to_event).collect())
    }

    /// Scan-based mean and count for an author, `None` when the author has no events
    pub async fn author_stats(&self, author: &str) -> Result<Option<(f64, i64)>, StoreError> {
        let mut conn = self.conn().await?;
        Self::author_stats_in(&mut *conn, author).await
    }

    pub(crate) async fn author_stats_in(
        conn: &mut SqliteConnection,
        author: &str,
    ) -> Result<Option<(f64, i64)>, StoreError> {
        let (average, count): (Option<f64>, i64) =
            sqlx::query_as("SELECT AVG(sentiment), COUNT(*) FROM events WHERE author = ?1")
                .bind(author)
                .fetch_one(&mut *conn)
                .await?;

        Ok(average.filter(|_| count > 0).map(|avg| (avg, count)))
    }

    /// Distinct authors present in the log
    pub async fn authors(&self) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn().await?;
        let authors: Vec<String> =
            sqlx::query_scalar("SELECT DISTINCT author FROM events ORDER BY author ASC")
                .fetch_all(&mut *conn)
                .await?;

        Ok(authors)
    }

    /// Total number of stored events
    pub async fn count(&self) -> Result<i64, StoreError> {
        let mut conn = self.conn().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(&mut *conn)
            .await?;

        Ok(count)
    }
}

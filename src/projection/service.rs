//! Author Aggregate Store
//!
//! Read model holding one row per author: running mean sentiment and event
//! count. Updated incrementally per event; rebuilt from the event log by
//! `repair` when drift is suspected.

use serde::Serialize;
use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::aggregate::AuthorAggregate;
use crate::db;
use crate::event_store::{EventLog, StoreError};

/// Before/after view of one author's aggregate against the event log
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RepairOutcome {
    pub author: String,
    /// Row as stored before the repair
    pub before: Option<AuthorAggregate>,
    /// Scan-based ground truth (`None` when the author has no events)
    pub after: Option<AuthorAggregate>,
}

impl RepairOutcome {
    /// Whether the stored row disagreed with the log
    pub fn drifted(&self) -> bool {
        match (&self.before, &self.after) {
            (Some(before), Some(after)) => !before.matches(after),
            (None, None) => false,
            _ => true,
        }
    }

    /// Events the stored row was missing (negative when it over-counted)
    pub fn count_delta(&self) -> i64 {
        let count = |agg: &Option<AuthorAggregate>| agg.as_ref().map_or(0, |a| a.event_count);
        count(&self.after) - count(&self.before)
    }
}

/// Store of per-author aggregates
#[derive(Debug, Clone)]
pub struct AuthorAggregateStore {
    pool: SqlitePool,
}

impl AuthorAggregateStore {
    /// Create a new AuthorAggregateStore
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Ensure the aggregate table exists. Safe to call any number of times.
    pub async fn initialize(&self) -> Result<(), StoreError> {
        self.conn().await?;
        Ok(())
    }

    /// Acquire a connection with the aggregate table guaranteed to exist.
    ///
    /// Every operation goes through here: the table may be introduced into a
    /// deployment whose event log already holds data.
    async fn conn(&self) -> Result<PoolConnection<Sqlite>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        db::ensure_author_aggregate(&mut *conn).await?;
        Ok(conn)
    }

    /// Get the aggregate for one author
    pub async fn get(&self, author: &str) -> Result<Option<AuthorAggregate>, StoreError> {
        let mut conn = self.conn().await?;
        Self::get_in(&mut *conn, author).await
    }

    pub(crate) async fn get_in(
        conn: &mut SqliteConnection,
        author: &str,
    ) -> Result<Option<AuthorAggregate>, StoreError> {
        let row: Option<(String, f64, i64)> = sqlx::query_as(
            r#"
            SELECT author, average_sentiment, event_count
            FROM author_aggregate
            WHERE author = ?1
            "#,
        )
        .bind(author)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(|(author, average_sentiment, event_count)| AuthorAggregate {
            author,
            average_sentiment,
            event_count,
        }))
    }

    /// Fold one sentiment into an author's aggregate, in its own transaction
    pub async fn upsert_incremental(
        &self,
        author: &str,
        sentiment: f64,
    ) -> Result<AuthorAggregate, StoreError> {
        let mut tx = self.pool.begin().await?;
        db::ensure_author_aggregate(&mut *tx).await?;
        let aggregate = Self::upsert_incremental_in(&mut *tx, author, sentiment).await?;
        tx.commit().await?;
        Ok(aggregate)
    }

    /// Read, compute and write the running mean on a caller-owned transaction.
    ///
    /// The caller must hold the transaction that appended the triggering event
    /// so that the log and the aggregate commit together.
    pub(crate) async fn upsert_incremental_in(
        conn: &mut SqliteConnection,
        author: &str,
        sentiment: f64,
    ) -> Result<AuthorAggregate, StoreError> {
        let previous = Self::get_in(conn, author).await?;
        let aggregate = AuthorAggregate::fold(previous, author, sentiment);
        Self::write_in(conn, &aggregate).await?;

        tracing::debug!(
            author = %aggregate.author,
            average_sentiment = aggregate.average_sentiment,
            event_count = aggregate.event_count,
            "Author aggregate updated"
        );

        Ok(aggregate)
    }

    async fn write_in(
        conn: &mut SqliteConnection,
        aggregate: &AuthorAggregate,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO author_aggregate (author, average_sentiment, event_count)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (author)
            DO UPDATE SET average_sentiment = excluded.average_sentiment,
                          event_count = excluded.event_count
            "#,
        )
        .bind(&aggregate.author)
        .bind(aggregate.average_sentiment)
        .bind(aggregate.event_count)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// All aggregates, highest mean first, ties by author ascending
    pub async fn list_all_ordered(&self) -> Result<Vec<AuthorAggregate>, StoreError> {
        let mut conn = self.conn().await?;
        let rows: Vec<(String, f64, i64)> = sqlx::query_as(
            r#"
            SELECT author, average_sentiment, event_count
            FROM author_aggregate
            ORDER BY average_sentiment DESC, author ASC
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(author, average_sentiment, event_count)| AuthorAggregate {
                author,
                average_sentiment,
                event_count,
            })
            .collect())
    }

    // =========================================================================
    // Verify / repair
    // =========================================================================

    /// Compare the stored row with a scan of the log, without writing
    pub async fn verify(&self, author: &str) -> Result<RepairOutcome, StoreError> {
        let mut conn = self.conn().await?;
        db::ensure_event_log(&mut *conn).await?;
        Self::outcome_in(&mut *conn, author).await
    }

    async fn outcome_in(
        conn: &mut SqliteConnection,
        author: &str,
    ) -> Result<RepairOutcome, StoreError> {
        let before = Self::get_in(conn, author).await?;
        let after = EventLog::author_stats_in(conn, author)
            .await?
            .map(|(average_sentiment, event_count)| AuthorAggregate {
                author: author.to_string(),
                average_sentiment,
                event_count,
            });

        Ok(RepairOutcome {
            author: author.to_string(),
            before,
            after,
        })
    }

    /// Recompute one author's aggregate from the log and overwrite the row
    pub async fn repair(&self, author: &str) -> Result<RepairOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;
        db::ensure_schema(&mut *tx).await?;
        let outcome = Self::repair_in(&mut *tx, author).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    /// Repair on a caller-owned transaction
    pub(crate) async fn repair_in(
        conn: &mut SqliteConnection,
        author: &str,
    ) -> Result<RepairOutcome, StoreError> {
        let outcome = Self::outcome_in(conn, author).await?;

        match &outcome.after {
            Some(truth) => Self::write_in(conn, truth).await?,
            None => {
                sqlx::query("DELETE FROM author_aggregate WHERE author = ?1")
                    .bind(author)
                    .execute(&mut *conn)
                    .await?;
            }
        }

        if outcome.drifted() {
            tracing::warn!(
                author = %author,
                before = ?outcome.before,
                after = ?outcome.after,
                count_delta = outcome.count_delta(),
                "Repaired drifted author aggregate"
            );
        }

        Ok(outcome)
    }

    /// Repair every author found in the log or in the aggregate table
    pub async fn repair_all(&self) -> Result<Vec<RepairOutcome>, StoreError> {
        let mut tx = self.pool.begin().await?;
        db::ensure_schema(&mut *tx).await?;

        let authors: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT author FROM events
            UNION
            SELECT author FROM author_aggregate
            ORDER BY author ASC
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;

        let mut outcomes = Vec::with_capacity(authors.len());
        for author in &authors {
            outcomes.push(Self::repair_in(&mut *tx, author).await?);
        }

        tx.commit().await?;
        Ok(outcomes)
    }
}

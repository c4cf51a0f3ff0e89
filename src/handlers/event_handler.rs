//! Event Handler
//!
//! Validates one event, appends it to the log and folds it into the author's
//! aggregate. Both writes commit together or not at all.

use std::time::Duration;

use sqlx::{SqliteConnection, SqlitePool};

use crate::aggregate::AuthorAggregate;
use crate::config::Config;
use crate::db;
use crate::domain::{MalformedEvent, NewEvent, RawEvent, ValidationPolicy};
use crate::event_store::{with_timeout, EventLog, StoreError};
use crate::projection::AuthorAggregateStore;

use super::IngestResult;

/// Why a single event could not be processed
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Malformed event: {0}")]
    Malformed(#[from] MalformedEvent),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl ProcessError {
    /// Worth retrying the same event after a delay
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProcessError::Storage(e) if e.is_retryable())
    }
}

/// Handler for ingesting events
#[derive(Debug, Clone)]
pub struct EventHandler {
    pool: SqlitePool,
    policy: ValidationPolicy,
    storage_timeout: Duration,
}

impl EventHandler {
    pub fn new(pool: SqlitePool, config: &Config) -> Self {
        Self::with_settings(
            pool,
            ValidationPolicy {
                enforce_sentiment_range: config.enforce_sentiment_range,
            },
            config.storage_timeout,
        )
    }

    pub fn with_settings(
        pool: SqlitePool,
        policy: ValidationPolicy,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            pool,
            policy,
            storage_timeout,
        }
    }

    /// Validate and persist one raw event
    pub async fn execute(&self, raw: RawEvent) -> Result<IngestResult, ProcessError> {
        let event = self.validate(raw)?;
        Ok(self.persist(&event).await?)
    }

    /// Check a raw event against this handler's policy, without writing
    pub fn validate(&self, raw: RawEvent) -> Result<NewEvent, MalformedEvent> {
        raw.validate(&self.policy)
    }

    /// Persist an already validated event.
    ///
    /// The storage timeout bounds the writes before COMMIT; a timed-out or
    /// failed attempt is rolled back and leaves nothing behind. An issued
    /// COMMIT is always awaited to completion.
    pub async fn persist(&self, event: &NewEvent) -> Result<IngestResult, StoreError> {
        let mut tx = self.pool.begin().await?;

        let (event_id, aggregate) =
            with_timeout(self.storage_timeout, Self::write_in(&mut *tx, event)).await?;

        tx.commit().await?;

        tracing::debug!(
            event_id,
            author = %event.author,
            sentiment = event.sentiment,
            "Event persisted"
        );

        Ok(IngestResult {
            event_id,
            aggregate,
        })
    }

    async fn write_in(
        conn: &mut SqliteConnection,
        event: &NewEvent,
    ) -> Result<(i64, AuthorAggregate), StoreError> {
        db::ensure_schema(&mut *conn).await?;

        let event_id = EventLog::append_in(&mut *conn, event).await?;
        let aggregate =
            AuthorAggregateStore::upsert_incremental_in(&mut *conn, &event.author, event.sentiment)
                .await?;

        Ok((event_id, aggregate))
    }
}

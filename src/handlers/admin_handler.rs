//! Admin Handler
//!
//! Administrative operations that are never part of normal ingestion.

use sqlx::SqlitePool;

use crate::db;
use crate::event_store::{EventLog, StoreError};
use crate::projection::AuthorAggregateStore;

use super::DeleteEventResult;

/// Admin operation errors
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("Reset is disabled in production")]
    ResetRefused,
}

impl From<sqlx::Error> for AdminError {
    fn from(err: sqlx::Error) -> Self {
        AdminError::Storage(err.into())
    }
}

/// Handler for administrative operations
#[derive(Debug, Clone)]
pub struct AdminHandler {
    pool: SqlitePool,
    production: bool,
}

impl AdminHandler {
    pub fn new(pool: SqlitePool, production: bool) -> Self {
        Self { pool, production }
    }

    /// Delete one event and recompute its author's aggregate in the same
    /// transaction, so the aggregate never counts an event the log lost.
    pub async fn delete_event(&self, event_id: i64) -> Result<DeleteEventResult, AdminError> {
        let mut tx = self.pool.begin().await?;
        db::ensure_schema(&mut *tx).await?;

        let event = EventLog::delete_in(&mut *tx, event_id).await?;
        let repair = AuthorAggregateStore::repair_in(&mut *tx, &event.author).await?;

        tx.commit().await?;

        tracing::info!(
            event_id,
            author = %event.author,
            remaining = repair.after.as_ref().map_or(0, |a| a.event_count),
            "Event deleted and author aggregate recomputed"
        );

        Ok(DeleteEventResult { event, repair })
    }

    /// Drop and recreate both tables
    pub async fn reset(&self) -> Result<(), AdminError> {
        if self.production {
            return Err(AdminError::ResetRefused);
        }
        db::reset(&self.pool).await?;
        Ok(())
    }
}

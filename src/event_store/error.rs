//! Event Store Errors
//!
//! Error types for event log and aggregate store operations.

use std::time::Duration;

/// Errors that can occur while talking to the storage medium
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Medium cannot be opened or reached (I/O, closed pool, busy database)
    #[error("Storage unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    /// A storage step did not finish in time
    #[error("Storage operation timed out after {0:?}")]
    Timeout(Duration),

    /// The write was refused (constraint violation, malformed row)
    #[error("Storage rejected operation: {0}")]
    Rejected(#[source] sqlx::Error),

    /// No event with this id
    #[error("Event not found: {0}")]
    EventNotFound(i64),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let unavailable = match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => true,
            sqlx::Error::Database(db) => db
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map(|code| is_transient_sqlite_code(code & 0xff))
                .unwrap_or(false),
            _ => false,
        };

        if unavailable {
            StoreError::Unavailable(err)
        } else {
            StoreError::Rejected(err)
        }
    }
}

/// SQLITE_BUSY, SQLITE_LOCKED, SQLITE_IOERR, SQLITE_CANTOPEN
fn is_transient_sqlite_code(primary: i32) -> bool {
    matches!(primary, 5 | 6 | 10 | 14)
}

impl StoreError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Timeout(_))
    }
}

/// Run a storage step under `limit`, mapping expiry to [`StoreError::Timeout`]
pub async fn with_timeout<T, F>(limit: Duration, step: F) -> Result<T, StoreError>
where
    F: std::future::Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, step).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

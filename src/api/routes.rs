//! API Routes
//!
//! Read-only HTTP endpoints over the author aggregates and the event log.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::aggregate::AuthorAggregate;
use crate::domain::StoredEvent;
use crate::error::{AppError, AppResult};
use crate::event_store::EventLog;
use crate::projection::{AuthorAggregateStore, RepairOutcome};
use crate::report::{ReportingView, Summary};

// =========================================================================
// Response types
// =========================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorEventsResponse {
    pub author: String,
    pub events: Vec<StoredEvent>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub author: String,
    pub drifted: bool,
    pub count_delta: i64,
    pub stored: Option<AuthorAggregate>,
    pub recomputed: Option<AuthorAggregate>,
}

impl From<RepairOutcome> for VerifyResponse {
    fn from(outcome: RepairOutcome) -> Self {
        Self {
            drifted: outcome.drifted(),
            count_delta: outcome.count_delta(),
            author: outcome.author,
            stored: outcome.before,
            recomputed: outcome.after,
        }
    }
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router() -> Router<SqlitePool> {
    Router::new()
        .route("/authors", get(list_authors))
        .route("/authors/:author", get(get_author))
        .route("/authors/:author/events", get(get_author_events))
        .route("/authors/:author/verify", get(verify_author))
}

/// GET /authors: every author, highest mean first
async fn list_authors(State(pool): State<SqlitePool>) -> AppResult<Json<Summary>> {
    let view = ReportingView::new(AuthorAggregateStore::new(pool));
    Ok(Json(view.snapshot().await?))
}

/// GET /authors/:author
async fn get_author(
    State(pool): State<SqlitePool>,
    Path(author): Path<String>,
) -> AppResult<Json<AuthorAggregate>> {
    let store = AuthorAggregateStore::new(pool);
    store
        .get(&author)
        .await?
        .map(Json)
        .ok_or(AppError::AuthorNotFound(author))
}

/// GET /authors/:author/events
async fn get_author_events(
    State(pool): State<SqlitePool>,
    Path(author): Path<String>,
) -> AppResult<Json<AuthorEventsResponse>> {
    let events = EventLog::new(pool).scan_by_author(&author).await?;
    if events.is_empty() {
        return Err(AppError::AuthorNotFound(author));
    }

    Ok(Json(AuthorEventsResponse {
        author,
        total: events.len(),
        events,
    }))
}

/// GET /authors/:author/verify: stored row against a scan of the log
async fn verify_author(
    State(pool): State<SqlitePool>,
    Path(author): Path<String>,
) -> AppResult<Json<VerifyResponse>> {
    let outcome = AuthorAggregateStore::new(pool).verify(&author).await?;
    if outcome.before.is_none() && outcome.after.is_none() {
        return Err(AppError::AuthorNotFound(author));
    }
    Ok(Json(outcome.into()))
}

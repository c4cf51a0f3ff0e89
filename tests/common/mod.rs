//! Common test utilities

#![allow(dead_code)]

use std::time::Duration;

use sqlx::SqlitePool;

use sentiment_stream::db;
use sentiment_stream::domain::{RawEvent, ValidationPolicy};
use sentiment_stream::handlers::EventHandler;

/// Fresh in-memory database with both tables created
pub async fn setup_test_db() -> SqlitePool {
    let pool = db::connect("sqlite::memory:", 1, Duration::from_secs(5))
        .await
        .expect("Failed to open in-memory database");

    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    db::ensure_schema(&mut conn).await.expect("Failed to create schema");
    drop(conn);

    pool
}

pub fn handler(pool: &SqlitePool) -> EventHandler {
    EventHandler::with_settings(
        pool.clone(),
        ValidationPolicy::default(),
        Duration::from_secs(5),
    )
}

/// A complete event for `author`
pub fn event(author: &str, sentiment: f64) -> RawEvent {
    let message = format!("Streaming message from {author}");
    RawEvent {
        message_length: Some(message.len() as i64),
        message: Some(message),
        author: Some(author.to_string()),
        timestamp: Some("2026-01-01 00:00:00".to_string()),
        category: Some("demo".to_string()),
        sentiment: Some(sentiment),
        keyword_mentioned: Some("demo".to_string()),
    }
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

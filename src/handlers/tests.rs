//! Handler tests against an in-memory database

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use sqlx::SqlitePool;

    use crate::db;
    use crate::domain::{MalformedEvent, RawEvent, ValidationPolicy};
    use crate::event_store::{EventLog, StoreError};
    use crate::handlers::{AdminError, AdminHandler, EventHandler, ProcessError};
    use crate::projection::AuthorAggregateStore;

    async fn pool() -> SqlitePool {
        db::connect("sqlite::memory:", 1, Duration::from_secs(5))
            .await
            .unwrap()
    }

    fn handler(pool: &SqlitePool) -> EventHandler {
        EventHandler::with_settings(
            pool.clone(),
            ValidationPolicy::default(),
            Duration::from_secs(5),
        )
    }

    fn raw(author: &str, sentiment: f64) -> RawEvent {
        RawEvent {
            message: Some(format!("{author} says something")),
            author: Some(author.to_string()),
            timestamp: Some("2026-01-01 12:00:00".to_string()),
            category: Some("demo".to_string()),
            sentiment: Some(sentiment),
            keyword_mentioned: Some("demo".to_string()),
            message_length: None,
        }
    }

    // =========================================================================
    // EventHandler
    // =========================================================================

    #[tokio::test]
    async fn test_execute_appends_and_updates_aggregate() {
        let pool = pool().await;
        let handler = handler(&pool);

        let first = handler.execute(raw("Alice", 0.2)).await.unwrap();
        let second = handler.execute(raw("Alice", 0.6)).await.unwrap();

        assert!(second.event_id > first.event_id);
        assert_eq!(second.aggregate.event_count, 2);
        assert!((second.aggregate.average_sentiment - 0.4).abs() < 1e-12);

        let log = EventLog::new(pool.clone());
        assert_eq!(log.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_execute_rejects_malformed_before_writing() {
        let pool = pool().await;
        let handler = handler(&pool);

        let mut bad = raw("Alice", 0.5);
        bad.sentiment = None;

        let err = handler.execute(bad).await.unwrap_err();
        assert!(matches!(
            err,
            ProcessError::Malformed(MalformedEvent::MissingField("sentiment"))
        ));
        assert!(!err.is_retryable());

        assert_eq!(EventLog::new(pool.clone()).count().await.unwrap(), 0);
        assert!(AuthorAggregateStore::new(pool).get("Alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_timed_out_persist_never_commits() {
        let pool = pool().await;
        let event = raw("Alice", 0.5)
            .validate(&ValidationPolicy::default())
            .unwrap();

        let mut committed = 0;
        let mut timed_out = 0;
        for micros in [50, 100, 200, 500, 1_000, 2_000, 5_000, 20_000] {
            let handler = EventHandler::with_settings(
                pool.clone(),
                ValidationPolicy::default(),
                Duration::from_micros(micros),
            );
            match handler.persist(&event).await {
                Ok(_) => committed += 1,
                Err(StoreError::Timeout(_)) => timed_out += 1,
                Err(e) => panic!("unexpected storage error: {e}"),
            }
        }
        assert_eq!(committed + timed_out, 8);

        // Only acknowledged writes are in the log
        assert_eq!(EventLog::new(pool.clone()).count().await.unwrap(), committed);
        let stored = AuthorAggregateStore::new(pool).get("Alice").await.unwrap();
        assert_eq!(stored.map_or(0, |a| a.event_count), committed);
    }

    #[tokio::test]
    async fn test_process_error_retryable_only_for_unavailable_storage() {
        let unavailable = ProcessError::Storage(StoreError::Unavailable(sqlx::Error::PoolTimedOut));
        assert!(unavailable.is_retryable());

        let rejected = ProcessError::Storage(StoreError::Rejected(sqlx::Error::RowNotFound));
        assert!(!rejected.is_retryable());
    }

    // =========================================================================
    // AdminHandler
    // =========================================================================

    #[tokio::test]
    async fn test_delete_event_keeps_aggregate_consistent() {
        let pool = pool().await;
        let handler = handler(&pool);

        handler.execute(raw("Alice", 0.2)).await.unwrap();
        let doomed = handler.execute(raw("Alice", 0.6)).await.unwrap();

        let admin = AdminHandler::new(pool.clone(), false);
        let result = admin.delete_event(doomed.event_id).await.unwrap();

        assert_eq!(result.event.id, doomed.event_id);
        let after = result.repair.after.unwrap();
        assert_eq!(after.event_count, 1);
        assert!((after.average_sentiment - 0.2).abs() < 1e-12);

        let stored = AuthorAggregateStore::new(pool).get("Alice").await.unwrap().unwrap();
        assert_eq!(stored.event_count, 1);
    }

    #[tokio::test]
    async fn test_delete_last_event_removes_aggregate() {
        let pool = pool().await;
        let only = handler(&pool).execute(raw("Bob", 0.8)).await.unwrap();

        AdminHandler::new(pool.clone(), false)
            .delete_event(only.event_id)
            .await
            .unwrap();

        assert!(AuthorAggregateStore::new(pool).get("Bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_unknown_event() {
        let pool = pool().await;
        let err = AdminHandler::new(pool, false)
            .delete_event(42)
            .await
            .unwrap_err();
        assert!(matches!(err, AdminError::Storage(StoreError::EventNotFound(42))));
    }

    #[tokio::test]
    async fn test_reset_refused_in_production() {
        let pool = pool().await;
        handler(&pool).execute(raw("Alice", 0.3)).await.unwrap();

        let err = AdminHandler::new(pool.clone(), true).reset().await.unwrap_err();
        assert!(matches!(err, AdminError::ResetRefused));
        assert_eq!(EventLog::new(pool.clone()).count().await.unwrap(), 1);

        AdminHandler::new(pool.clone(), false).reset().await.unwrap();
        assert_eq!(EventLog::new(pool).count().await.unwrap(), 0);
    }
}

//! Integration tests for the event log, aggregate store and repair

use sentiment_stream::db;
use sentiment_stream::domain::ValidationPolicy;
use sentiment_stream::event_store::EventLog;
use sentiment_stream::projection::AuthorAggregateStore;

mod common;

use common::{approx_eq, event};

#[tokio::test]
async fn test_append_assigns_increasing_ids_and_scans_in_order() {
    let pool = common::setup_test_db().await;
    let log = EventLog::new(pool);
    let policy = ValidationPolicy::default();

    let e1 = event("Alice", 0.1).validate(&policy).unwrap();
    let e2 = event("Bob", 0.9).validate(&policy).unwrap();
    let e3 = event("Alice", 0.3).validate(&policy).unwrap();

    let id1 = log.append(&e1).await.unwrap();
    let id2 = log.append(&e2).await.unwrap();
    let id3 = log.append(&e3).await.unwrap();
    assert!(id1 < id2 && id2 < id3);

    let alice = log.scan_by_author("Alice").await.unwrap();
    assert_eq!(alice.len(), 2);
    assert_eq!(alice[0], e1.clone().stored(id1));
    assert_eq!(alice[1].id, id3);
    assert_eq!(alice[1].sentiment, 0.3);

    assert_eq!(log.authors().await.unwrap(), vec!["Alice", "Bob"]);
    assert_eq!(log.count().await.unwrap(), 3);

    let (avg, count) = log.author_stats("Alice").await.unwrap().unwrap();
    assert_eq!(count, 2);
    assert!(approx_eq(avg, 0.2));
    assert!(log.author_stats("Nobody").await.unwrap().is_none());
}

#[tokio::test]
async fn test_append_rejects_schema_violation() {
    let pool = common::setup_test_db().await;
    let log = EventLog::new(pool);

    let mut bad = event("Alice", 0.5)
        .validate(&ValidationPolicy::default())
        .unwrap();
    bad.message_length = -1;

    let err = log.append(&bad).await.unwrap_err();
    assert!(!err.is_retryable());
    assert_eq!(log.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_plain_delete_leaves_drift_that_repair_heals() {
    let pool = common::setup_test_db().await;
    let handler = common::handler(&pool);
    let log = EventLog::new(pool.clone());
    let store = AuthorAggregateStore::new(pool);

    handler.execute(event("Alice", 0.2)).await.unwrap();
    let second = handler.execute(event("Alice", 0.8)).await.unwrap();

    let removed = log.delete(second.event_id).await.unwrap();
    assert_eq!(removed.sentiment, 0.8);
    assert!(log.get(second.event_id).await.unwrap().is_none());

    let drift = store.verify("Alice").await.unwrap();
    assert!(drift.drifted());
    assert_eq!(drift.count_delta(), -1);

    let repaired = store.repair("Alice").await.unwrap();
    assert_eq!(repaired.after.as_ref().unwrap().event_count, 1);
    assert!(!store.verify("Alice").await.unwrap().drifted());
}

#[tokio::test]
async fn test_list_all_ordered_breaks_ties_by_author() {
    let pool = common::setup_test_db().await;
    let store = AuthorAggregateStore::new(pool);

    store.upsert_incremental("Charlie", 0.5).await.unwrap();
    store.upsert_incremental("Alice", 0.5).await.unwrap();
    store.upsert_incremental("Bob", 0.9).await.unwrap();
    store.upsert_incremental("Dana", 0.1).await.unwrap();

    let order: Vec<String> = store
        .list_all_ordered()
        .await
        .unwrap()
        .into_iter()
        .map(|a| a.author)
        .collect();
    assert_eq!(order, vec!["Bob", "Alice", "Charlie", "Dana"]);
}

#[tokio::test]
async fn test_incremental_mean_for_single_author() {
    let pool = common::setup_test_db().await;
    let handler = common::handler(&pool);
    let store = AuthorAggregateStore::new(pool);

    let sentiments = [0.13, 0.87, 0.5, 0.01, 0.99, 0.42, 0.42, 0.0, 1.0, 0.3, 0.77];
    for s in sentiments {
        handler.execute(event("Alice", s)).await.unwrap();
    }

    let agg = store.get("Alice").await.unwrap().unwrap();
    let expected = sentiments.iter().sum::<f64>() / sentiments.len() as f64;
    assert_eq!(agg.event_count, sentiments.len() as i64);
    assert!(approx_eq(agg.average_sentiment, expected));
    assert!(!store.verify("Alice").await.unwrap().drifted());
}

#[tokio::test]
async fn test_multi_author_isolation() {
    let pool = common::setup_test_db().await;
    let handler = common::handler(&pool);
    let store = AuthorAggregateStore::new(pool);

    handler.execute(event("Alice", 0.2)).await.unwrap();
    let alice_before = store.get("Alice").await.unwrap().unwrap();

    for s in [0.9, 0.1, 0.7] {
        handler.execute(event("Bob", s)).await.unwrap();
    }

    assert_eq!(store.get("Alice").await.unwrap().unwrap(), alice_before);
    assert_eq!(store.get("Bob").await.unwrap().unwrap().event_count, 3);
}

#[tokio::test]
async fn test_schema_guard_is_idempotent_and_preserves_rows() {
    let pool = common::setup_test_db().await;
    let handler = common::handler(&pool);
    let log = EventLog::new(pool.clone());
    let store = AuthorAggregateStore::new(pool.clone());

    handler.execute(event("Alice", 0.2)).await.unwrap();

    for _ in 0..3 {
        log.initialize().await.unwrap();
        store.initialize().await.unwrap();
        let mut conn = pool.acquire().await.unwrap();
        db::ensure_schema(&mut conn).await.unwrap();
    }

    handler.execute(event("Alice", 0.6)).await.unwrap();
    store.initialize().await.unwrap();

    let agg = store.get("Alice").await.unwrap().unwrap();
    assert_eq!(agg.event_count, 2);
    assert!(approx_eq(agg.average_sentiment, 0.4));
    assert_eq!(log.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_aggregate_table_created_after_events_exist() {
    let pool = db::connect("sqlite::memory:", 1, std::time::Duration::from_secs(5))
        .await
        .unwrap();
    let log = EventLog::new(pool.clone());
    let policy = ValidationPolicy::default();

    // A deployment that only ever had the event log
    log.append(&event("Alice", 0.2).validate(&policy).unwrap())
        .await
        .unwrap();
    log.append(&event("Alice", 0.6).validate(&policy).unwrap())
        .await
        .unwrap();
    assert!(!db::check_schema(&pool).await.unwrap().author_aggregate);

    let store = AuthorAggregateStore::new(pool.clone());
    assert!(store.get("Alice").await.unwrap().is_none());
    assert!(db::check_schema(&pool).await.unwrap().is_complete());

    let outcomes = store.repair_all().await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].drifted());

    let agg = store.get("Alice").await.unwrap().unwrap();
    assert_eq!(agg.event_count, 2);
    assert!(approx_eq(agg.average_sentiment, 0.4));
}

#[tokio::test]
async fn test_aggregate_table_dropped_mid_stream_is_recreated() {
    let pool = common::setup_test_db().await;
    let handler = common::handler(&pool);
    let store = AuthorAggregateStore::new(pool.clone());

    handler.execute(event("Alice", 0.2)).await.unwrap();
    sqlx::query("DROP TABLE author_aggregate")
        .execute(&pool)
        .await
        .unwrap();

    // The guard recreates the table; the new row only knows about this event
    let result = handler.execute(event("Alice", 0.6)).await.unwrap();
    assert_eq!(result.aggregate.event_count, 1);

    let outcome = store.repair("Alice").await.unwrap();
    assert!(outcome.drifted());
    assert_eq!(outcome.count_delta(), 1);

    let agg = store.get("Alice").await.unwrap().unwrap();
    assert_eq!(agg.event_count, 2);
    assert!(approx_eq(agg.average_sentiment, 0.4));
}

#[tokio::test]
async fn test_repair_converges_after_dropped_updates() {
    let pool = common::setup_test_db().await;
    let handler = common::handler(&pool);
    let log = EventLog::new(pool.clone());
    let store = AuthorAggregateStore::new(pool);
    let policy = ValidationPolicy::default();

    handler.execute(event("Alice", 0.1)).await.unwrap();
    // Appended without its aggregate update, as if the process died in between
    log.append(&event("Alice", 0.9).validate(&policy).unwrap())
        .await
        .unwrap();
    handler.execute(event("Alice", 0.5)).await.unwrap();
    handler.execute(event("Bob", 0.7)).await.unwrap();

    let stale = store.get("Alice").await.unwrap().unwrap();
    assert_eq!(stale.event_count, 2);

    let outcomes = store.repair_all().await.unwrap();
    let drifted: Vec<&str> = outcomes
        .iter()
        .filter(|o| o.drifted())
        .map(|o| o.author.as_str())
        .collect();
    assert_eq!(drifted, vec!["Alice"]);

    let alice = store.get("Alice").await.unwrap().unwrap();
    let (avg, count) = log.author_stats("Alice").await.unwrap().unwrap();
    assert_eq!(alice.event_count, count);
    assert_eq!(alice.average_sentiment, avg);
    assert!(approx_eq(alice.average_sentiment, 0.5));

    // Idempotent
    let again = store.repair("Alice").await.unwrap();
    assert!(!again.drifted());
}

#[tokio::test]
async fn test_events_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("data/buzz.sqlite").display());
    let timeout = std::time::Duration::from_secs(5);

    {
        let pool = db::connect(&url, 2, timeout).await.unwrap();
        let handler = common::handler(&pool);
        handler.execute(event("Alice", 0.2)).await.unwrap();
        handler.execute(event("Bob", 0.8)).await.unwrap();
        pool.close().await;
    }

    let pool = db::connect(&url, 2, timeout).await.unwrap();
    let log = EventLog::new(pool.clone());
    let store = AuthorAggregateStore::new(pool.clone());

    // Re-initializing an existing store never drops data
    log.initialize().await.unwrap();
    store.initialize().await.unwrap();

    assert_eq!(log.count().await.unwrap(), 2);
    assert_eq!(store.list_all_ordered().await.unwrap().len(), 2);
    pool.close().await;
}

//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p event-store --test postgres_integration
//! ```

use std::sync::Arc;
use std::time::Duration;

use event_store::{
    AggregateId, AppendOptions, EventEnvelope, EventQuery, EventStore, EventStoreError,
    EventStreamPoller, PostgresEventStore, StreamConfig, Version,
};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::{OnceCell, watch};

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let pool = PgPool::connect(&connection_string).await.unwrap();
            PostgresEventStore::new(pool.clone())
                .run_migrations()
                .await
                .unwrap();
            pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and an empty event log
async fn get_test_store() -> PostgresEventStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE events RESTART IDENTITY")
        .execute(&pool)
        .await
        .unwrap();

    PostgresEventStore::new(pool)
}

fn create_test_event(aggregate_id: AggregateId, event_type: &str) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type("Order")
        .event_type(event_type)
        .payload_raw(serde_json::json!({"test": true}))
        .build()
}

#[tokio::test]
#[serial]
async fn append_and_retrieve_events() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();

    let stored = store
        .append(
            aggregate_id,
            vec![create_test_event(aggregate_id, "ORDER_CREATED")],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();
    assert_eq!(stored[0].version, Version::first());
    assert_eq!(stored[0].sequence, 1);
    assert!(stored[0].recorded_at.is_some());

    let events = store.get_events_for_aggregate(aggregate_id).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "ORDER_CREATED");
    assert_eq!(events[0].version, Version::first());
    assert_eq!(events[0].sequence, stored[0].sequence);
}

#[tokio::test]
#[serial]
async fn append_assigns_versions_after_existing_max() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();

    store
        .append(
            aggregate_id,
            vec![create_test_event(aggregate_id, "ORDER_CREATED")],
            AppendOptions::new(),
        )
        .await
        .unwrap();
    let stored = store
        .append(
            aggregate_id,
            vec![
                create_test_event(aggregate_id, "ORDER_STATUS_UPDATED"),
                create_test_event(aggregate_id, "ORDER_NOTE_ADDED"),
            ],
            AppendOptions::new(),
        )
        .await
        .unwrap();

    let versions: Vec<_> = stored.iter().map(|e| e.version.as_i64()).collect();
    assert_eq!(versions, vec![2, 3]);

    let persisted = store.get_events_for_aggregate(aggregate_id).await.unwrap();
    let kinds: Vec<_> = persisted.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(
        kinds,
        vec!["ORDER_CREATED", "ORDER_STATUS_UPDATED", "ORDER_NOTE_ADDED"]
    );
}

#[tokio::test]
#[serial]
async fn failed_batch_leaves_no_events_behind() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();

    let first = create_test_event(aggregate_id, "ORDER_CREATED");
    let mut second = create_test_event(aggregate_id, "ORDER_NOTE_ADDED");
    second.event_id = first.event_id;

    let result = store
        .append(aggregate_id, vec![first, second], AppendOptions::new())
        .await;

    assert!(matches!(result, Err(EventStoreError::Database(_))));
    assert!(
        store
            .get_events_for_aggregate(aggregate_id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
#[serial]
async fn optimistic_concurrency_conflict() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();

    store
        .append(
            aggregate_id,
            vec![create_test_event(aggregate_id, "ORDER_CREATED")],
            AppendOptions::expect_new(),
        )
        .await
        .unwrap();

    let result = store
        .append(
            aggregate_id,
            vec![create_test_event(aggregate_id, "ORDER_NOTE_ADDED")],
            AppendOptions::expect_version(Version::initial()),
        )
        .await;

    assert!(matches!(
        result,
        Err(EventStoreError::ConcurrencyConflict { .. })
    ));
    assert_eq!(
        store.get_aggregate_version(aggregate_id).await.unwrap(),
        Some(Version::first())
    );
}

#[tokio::test]
#[serial]
async fn concurrent_appends_produce_gap_free_versions() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();

    let mut handles = Vec::new();
    for _ in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .append(
                    aggregate_id,
                    vec![create_test_event(aggregate_id, "ORDER_NOTE_ADDED")],
                    AppendOptions::new(),
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let events = store.get_events_for_aggregate(aggregate_id).await.unwrap();
    let versions: Vec<_> = events.iter().map(|e| e.version.as_i64()).collect();
    assert_eq!(versions, (1..=20).collect::<Vec<_>>());
}

#[tokio::test]
#[serial]
async fn get_events_by_type() {
    let store = get_test_store().await;
    let id1 = AggregateId::new();
    let id2 = AggregateId::new();

    for (id, kind) in [
        (id1, "ORDER_CREATED"),
        (id2, "ORDER_CREATED"),
        (id1, "ORDER_CANCELLED"),
    ] {
        store
            .append(id, vec![create_test_event(id, kind)], AppendOptions::new())
            .await
            .unwrap();
    }

    let created = store.get_events_by_type("ORDER_CREATED").await.unwrap();
    assert_eq!(created.len(), 2);

    let cancelled = store.get_events_by_type("ORDER_CANCELLED").await.unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].aggregate_id, id1);
}

#[tokio::test]
#[serial]
async fn query_events_with_limit_and_offset() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();

    store
        .append(
            aggregate_id,
            (0..5)
                .map(|_| create_test_event(aggregate_id, "ORDER_NOTE_ADDED"))
                .collect(),
            AppendOptions::new(),
        )
        .await
        .unwrap();

    let query = EventQuery::new()
        .aggregate_id(aggregate_id)
        .limit(2)
        .offset(1);

    let results = store.query_events(query).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].version, Version::new(2));
    assert_eq!(results[1].version, Version::new(3));

    let page = store.get_all_events(3, 0).await.unwrap();
    assert_eq!(page.len(), 2);
}

#[tokio::test]
#[serial]
async fn sequence_cursor_queries() {
    let store = get_test_store().await;
    assert_eq!(store.latest_sequence().await.unwrap(), 0);

    let id = AggregateId::new();
    store
        .append(
            id,
            (0..3).map(|_| create_test_event(id, "ORDER_NOTE_ADDED")).collect(),
            AppendOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(store.latest_sequence().await.unwrap(), 3);
    let after: Vec<_> = store
        .get_events_after(1, 10)
        .await
        .unwrap()
        .iter()
        .map(|e| e.sequence)
        .collect();
    assert_eq!(after, vec![2, 3]);
}

#[tokio::test]
#[serial]
async fn poller_delivers_new_events() {
    let store = get_test_store().await;
    let (shutdown, rx) = watch::channel(false);
    let mut subscription = EventStreamPoller::subscribe(
        store.clone(),
        StreamConfig::default().poll_interval(Duration::from_millis(20)),
        rx,
    )
    .await
    .unwrap();

    let id = AggregateId::new();
    store
        .append(
            id,
            vec![
                create_test_event(id, "ORDER_CREATED"),
                create_test_event(id, "ORDER_NOTE_ADDED"),
            ],
            AppendOptions::new(),
        )
        .await
        .unwrap();

    for expected in ["ORDER_CREATED", "ORDER_NOTE_ADDED"] {
        let event = tokio::time::timeout(Duration::from_secs(5), subscription.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.event_type, expected);
    }

    shutdown.send(true).unwrap();
    subscription.join().await;
}

#[tokio::test]
#[serial]
async fn tracking_sequence_increments() {
    let store = get_test_store().await;

    let first = store.next_tracking_sequence().await.unwrap();
    let second = store.next_tracking_sequence().await.unwrap();
    assert_eq!(second, first + 1);
}

#[tokio::test]
#[serial]
async fn event_metadata_preserved() {
    let store = get_test_store().await;
    let aggregate_id = AggregateId::new();

    let event = EventEnvelope::builder()
        .aggregate_id(aggregate_id)
        .aggregate_type("Order")
        .event_type("ORDER_CREATED")
        .payload_raw(serde_json::json!({"data": "test"}))
        .metadata("correlation_id", serde_json::json!("corr-123"))
        .build();

    store
        .append(aggregate_id, vec![event], AppendOptions::new())
        .await
        .unwrap();

    let events = store.get_events_for_aggregate(aggregate_id).await.unwrap();
    assert_eq!(
        events[0].metadata.get("correlation_id"),
        Some(&serde_json::json!("corr-123"))
    );
    assert_eq!(events[0].payload, serde_json::json!({"data": "test"}));
}

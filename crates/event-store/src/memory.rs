use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventQuery, EventStoreError, Result, Version,
    store::{AppendOptions, EventStore, validate_events_for_append},
};

#[derive(Default)]
struct Log {
    events: Vec<EventEnvelope>,
    last_sequence: i64,
}

impl Log {
    fn current_version(&self, aggregate_id: AggregateId) -> Version {
        self.events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max()
            .unwrap_or(Version::initial())
    }
}

/// In-memory event store.
///
/// The write guard on the log is the atomic unit for appends: the version
/// read, the version assignment and the insert all happen under it.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<Log>>,
    tracking_sequence: Arc<AtomicI64>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.log.read().await.events.len()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    #[tracing::instrument(skip(self, events), fields(count = events.len()))]
    async fn append(
        &self,
        aggregate_id: AggregateId,
        events: Vec<EventEnvelope>,
        options: AppendOptions,
    ) -> Result<Vec<EventEnvelope>> {
        if events.is_empty() {
            return Ok(Vec::new());
        }
        validate_events_for_append(aggregate_id, &events)?;

        let mut log = self.log.write().await;
        let current_version = log.current_version(aggregate_id);

        if let Some(expected) = options.expected_version
            && current_version != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current_version,
            });
        }

        let recorded_at = Utc::now();
        let mut version = current_version;
        let mut stored = Vec::with_capacity(events.len());
        for mut event in events {
            version = version.next();
            log.last_sequence += 1;
            event.version = version;
            event.sequence = log.last_sequence;
            event.recorded_at = Some(recorded_at);
            stored.push(event);
        }
        log.events.extend(stored.iter().cloned());

        metrics::counter!("event_store_events_appended").increment(stored.len() as u64);
        tracing::debug!(version = %version, "events appended");

        Ok(stored)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        let mut events: Vec<_> = log
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        let mut events: Vec<_> = log
            .events
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();

        events.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.sequence.cmp(&b.sequence))
        });

        let events = events.into_iter().skip(query.offset.unwrap_or(0));
        let events = match query.limit {
            Some(limit) => events.take(limit).collect(),
            None => events.collect(),
        };

        Ok(events)
    }

    async fn get_events_after(&self, sequence: i64, limit: usize) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        // The log is append-only, so it is already in sequence order.
        Ok(log
            .events
            .iter()
            .filter(|e| e.sequence > sequence)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn latest_sequence(&self) -> Result<i64> {
        Ok(self.log.read().await.last_sequence)
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        let log = self.log.read().await;
        let version = log
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max();
        Ok(version)
    }

    async fn next_tracking_sequence(&self) -> Result<i64> {
        Ok(self.tracking_sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

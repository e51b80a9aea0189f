use async_trait::async_trait;

use crate::{AggregateId, EventEnvelope, EventQuery, EventStoreError, Result, Version};

/// Options for appending events to the store.
#[derive(Debug, Clone, Default)]
pub struct AppendOptions {
    /// Expected current version of the aggregate.
    ///
    /// `None` means last-write-wins: the store still assigns gap-free
    /// versions, it just does not reject appends from stale readers.
    pub expected_version: Option<Version>,
}

impl AppendOptions {
    /// Creates options with no version check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options expecting the aggregate to be at a specific version.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: Some(version),
        }
    }

    /// Creates options expecting the aggregate to not exist (new aggregate).
    pub fn expect_new() -> Self {
        Self {
            expected_version: Some(Version::initial()),
        }
    }
}

/// Core trait for event store implementations.
///
/// The store is the single source of truth. It owns version assignment:
/// callers hand over envelopes whose `version`/`sequence` are placeholders
/// and get back the persisted envelopes.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends events for one aggregate.
    ///
    /// Events are persisted atomically in the supplied order. Versions
    /// `max + 1, max + 2, ...` are assigned inside the same atomic unit that
    /// read `max`, so concurrent appends to one aggregate never collide or
    /// leave gaps. An empty batch is a no-op.
    async fn append(
        &self,
        aggregate_id: AggregateId,
        events: Vec<EventEnvelope>,
        options: AppendOptions,
    ) -> Result<Vec<EventEnvelope>>;

    /// Retrieves all events for a specific aggregate, oldest version first.
    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>>;

    /// Retrieves events matching a query.
    ///
    /// Results are ordered by timestamp, ties broken by sequence.
    async fn query_events(&self, query: EventQuery) -> Result<Vec<EventEnvelope>>;

    /// Retrieves events by type, ordered by timestamp.
    async fn get_events_by_type(&self, event_type: &str) -> Result<Vec<EventEnvelope>> {
        self.query_events(EventQuery::for_event_type(event_type))
            .await
    }

    /// Retrieves a page of all events ordered by timestamp.
    ///
    /// A `limit` of 0 means no limit.
    async fn get_all_events(&self, offset: usize, limit: usize) -> Result<Vec<EventEnvelope>> {
        let mut query = EventQuery::new().offset(offset);
        if limit > 0 {
            query = query.limit(limit);
        }
        self.query_events(query).await
    }

    /// Retrieves up to `limit` events with a sequence greater than `sequence`,
    /// in sequence order.
    async fn get_events_after(&self, sequence: i64, limit: usize) -> Result<Vec<EventEnvelope>>;

    /// Returns the highest sequence assigned so far, or 0 for an empty store.
    async fn latest_sequence(&self) -> Result<i64>;

    /// Gets the current version of an aggregate.
    ///
    /// Returns None if the aggregate doesn't exist.
    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>>;

    /// Draws the next value of the tracking-number sequence.
    async fn next_tracking_sequence(&self) -> Result<i64>;
}

/// Checks that every event in a batch targets `aggregate_id` and shares one
/// aggregate type.
pub fn validate_events_for_append(aggregate_id: AggregateId, events: &[EventEnvelope]) -> Result<()> {
    let Some(first) = events.first() else {
        return Ok(());
    };

    for event in events {
        if event.aggregate_id != aggregate_id {
            return Err(EventStoreError::InvalidAppend(format!(
                "event {} belongs to aggregate {}, not {}",
                event.event_id, event.aggregate_id, aggregate_id
            )));
        }
        if event.aggregate_type != first.aggregate_type {
            return Err(EventStoreError::InvalidAppend(
                "all events must have the same aggregate type".to_string(),
            ));
        }
    }

    Ok(())
}

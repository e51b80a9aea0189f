//! Core aggregate and domain event traits.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::{EventEnvelope, Version};
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    ///
    /// This is used for serialization and event store filtering.
    fn event_type(&self) -> &'static str;

    /// When the fact happened, according to the domain clock.
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// Trait for aggregates in an event-sourced system.
///
/// In event sourcing, aggregates:
/// - Are rebuilt by replaying events
/// - Generate events from commands
/// - Apply events to update state (pure, deterministic)
pub trait Aggregate: Send + Sync + Sized {
    /// The type of events this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Returns the aggregate type name.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's unique identifier.
    fn id(&self) -> AggregateId;

    /// Returns the version of the last persisted event applied.
    ///
    /// 0 for an aggregate that has not been stored yet.
    fn version(&self) -> Version;

    /// Sets the aggregate version.
    fn set_version(&mut self, version: Version);

    /// Applies an event to the aggregate, updating its state.
    ///
    /// This method must be pure and deterministic:
    /// - Given the same state and event, it must always produce the same new state
    /// - It must not have side effects
    /// - It must not fail (events represent facts that have happened)
    fn apply(&mut self, event: Self::Event);

    /// Applies multiple events in sequence.
    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

/// Wraps domain events in envelopes ready for [`EventStore::append`].
///
/// Versions are left for the store to assign.
///
/// [`EventStore::append`]: event_store::EventStore::append
pub fn to_envelopes<A: Aggregate>(
    aggregate_id: AggregateId,
    events: &[A::Event],
) -> Result<Vec<EventEnvelope>, serde_json::Error> {
    events
        .iter()
        .map(|event| {
            Ok(EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .timestamp(event.occurred_at())
                .payload(event)?
                .build())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum TestEvent {
        Created { at: DateTime<Utc> },
        Updated { value: i32, at: DateTime<Utc> },
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TestEvent::Created { .. } => "TestCreated",
                TestEvent::Updated { .. } => "TestUpdated",
            }
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            match self {
                TestEvent::Created { at } | TestEvent::Updated { at, .. } => *at,
            }
        }
    }

    #[derive(Debug, Clone)]
    struct TestAggregate {
        id: AggregateId,
        value: i32,
        version: Version,
    }

    impl Aggregate for TestAggregate {
        type Event = TestEvent;

        fn aggregate_type() -> &'static str {
            "TestAggregate"
        }

        fn id(&self) -> AggregateId {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                TestEvent::Created { .. } => {}
                TestEvent::Updated { value, .. } => {
                    self.value = value;
                }
            }
        }
    }

    #[test]
    fn test_aggregate_apply_events() {
        let now = Utc::now();
        let mut aggregate = TestAggregate {
            id: AggregateId::new(),
            value: 0,
            version: Version::initial(),
        };

        aggregate.apply_events(vec![
            TestEvent::Created { at: now },
            TestEvent::Updated { value: 42, at: now },
        ]);

        assert_eq!(aggregate.value, 42);
    }

    #[test]
    fn test_to_envelopes_carries_type_and_timestamp() {
        let id = AggregateId::new();
        let at = Utc::now();
        let events = vec![
            TestEvent::Created { at },
            TestEvent::Updated { value: 1, at },
        ];

        let envelopes = to_envelopes::<TestAggregate>(id, &events).unwrap();

        assert_eq!(envelopes.len(), 2);
        assert!(envelopes.iter().all(|e| e.aggregate_id == id));
        assert!(envelopes.iter().all(|e| e.aggregate_type == "TestAggregate"));
        assert_eq!(envelopes[0].event_type, "TestCreated");
        assert_eq!(envelopes[1].event_type, "TestUpdated");
        assert_eq!(envelopes[1].timestamp, at);
        assert_eq!(envelopes[1].version, Version::initial());
    }
}

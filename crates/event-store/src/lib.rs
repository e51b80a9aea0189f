pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod store;
pub mod stream;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use query::EventQuery;
pub use store::{AppendOptions, EventStore};
pub use stream::{EventStreamPoller, EventSubscription, StreamConfig};

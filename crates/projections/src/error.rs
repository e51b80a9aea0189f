//! Projection error types.

use common::AggregateId;
use thiserror::Error;

/// Errors that can occur while maintaining or querying the read model.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// No order matches the lookup key.
    #[error("Order not found: {0}")]
    NotFound(String),

    /// An update event arrived for an order the read model has never seen.
    #[error("No read-model row for order {order_id}")]
    MissingRow { order_id: AggregateId },

    /// A stored row could not be turned back into a view.
    #[error("Invalid read-model row: {0}")]
    InvalidRow(String),

    /// An error occurred in the event store.
    #[error("Event store error: {0}")]
    EventStore(#[from] event_store::EventStoreError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failed to deserialize an event payload or a JSON column.
    #[error("Event deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;

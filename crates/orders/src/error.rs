//! Order service error types.

use std::time::Duration;

use common::AggregateId;
use domain::{DomainError, OrderError};
use event_store::EventStoreError;
use projections::ProjectionError;
use thiserror::Error;

/// Errors surfaced by [`OrderService`](crate::OrderService).
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The command broke a business rule. Retrying will not help.
    #[error("Validation failed: {0}")]
    Validation(#[from] OrderError),

    /// No order matches the given ID or tracking number.
    #[error("Order not found: {0}")]
    NotFound(String),

    /// The event store rejected or failed the operation.
    #[error("Persistence error: {0}")]
    Persistence(#[from] EventStoreError),

    /// The read model failed for a reason other than a missing order.
    #[error("Projection error: {0}")]
    Projection(ProjectionError),

    /// The stored history of an order cannot be replayed.
    #[error("Corrupt history for order {order_id}: {reason}")]
    CorruptHistory { order_id: AggregateId, reason: String },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The operation did not finish within the configured timeout.
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl From<ProjectionError> for ServiceError {
    fn from(err: ProjectionError) -> Self {
        match err {
            ProjectionError::NotFound(key) => ServiceError::NotFound(key),
            other => ServiceError::Projection(other),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::CorruptEvent {
                aggregate_id,
                version,
                source,
            } => ServiceError::CorruptHistory {
                order_id: aggregate_id,
                reason: format!("event {version}: {source}"),
            },
            DomainError::Serialization(e) => ServiceError::Serialization(e),
        }
    }
}

/// Result type for order service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

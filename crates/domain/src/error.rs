//! Domain error types.

use common::AggregateId;
use event_store::Version;
use thiserror::Error;

/// Errors that can occur while turning stored events back into aggregates.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A stored event could not be decoded into a known event kind.
    #[error("Corrupt event {version} for aggregate {aggregate_id}: {source}")]
    CorruptEvent {
        aggregate_id: AggregateId,
        version: Version,
        #[source]
        source: serde_json::Error,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

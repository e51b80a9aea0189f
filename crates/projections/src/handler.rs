//! Event handler trait.

use async_trait::async_trait;
use event_store::EventEnvelope;

use crate::Result;

/// Something that reacts to persisted events.
///
/// Handlers receive the stored envelope and decode the payload themselves, so
/// an undecodable record only fails the handler that looked at it.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Returns the name of this handler, used in logs.
    fn name(&self) -> &'static str;

    /// Handles a single event.
    async fn handle(&self, event: &EventEnvelope) -> Result<()>;
}

//! In-process event bus.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use domain::EventKind;
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::Result;
use crate::handler::EventHandler;

/// Publish/subscribe seam between the write side and its listeners.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Delivers `event` to every handler subscribed to its kind, in
    /// subscription order. The first handler error stops delivery and is
    /// returned.
    async fn publish(&self, event: &EventEnvelope) -> Result<()>;

    /// Registers `handler` for `kinds`. An empty slice means every kind.
    async fn subscribe(&self, handler: Arc<dyn EventHandler>, kinds: &[EventKind]);

    /// Removes `handler` from `kinds`. An empty slice means every kind.
    async fn unsubscribe(&self, handler: &Arc<dyn EventHandler>, kinds: &[EventKind]);
}

/// Single-process bus that calls handlers inline on the publisher's task.
#[derive(Clone, Default)]
pub struct InMemoryEventBus {
    handlers: Arc<RwLock<HashMap<EventKind, Vec<Arc<dyn EventHandler>>>>>,
}

impl InMemoryEventBus {
    /// Creates a bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of handlers subscribed to `kind`.
    pub async fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers
            .read()
            .await
            .get(&kind)
            .map_or(0, Vec::len)
    }
}

fn kinds_or_all(kinds: &[EventKind]) -> Vec<EventKind> {
    if kinds.is_empty() {
        EventKind::all().to_vec()
    } else {
        kinds.to_vec()
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type, order_id = %event.aggregate_id))]
    async fn publish(&self, event: &EventEnvelope) -> Result<()> {
        let Ok(kind) = event.event_type.parse::<EventKind>() else {
            tracing::debug!("no route for event type");
            return Ok(());
        };

        // Snapshot so handlers may (un)subscribe without deadlocking.
        let handlers = match self.handlers.read().await.get(&kind) {
            Some(handlers) => handlers.clone(),
            None => return Ok(()),
        };

        for handler in handlers {
            if let Err(e) = handler.handle(event).await {
                tracing::debug!(handler = handler.name(), error = %e, "handler failed");
                return Err(e);
            }
        }

        Ok(())
    }

    async fn subscribe(&self, handler: Arc<dyn EventHandler>, kinds: &[EventKind]) {
        let mut handlers = self.handlers.write().await;
        for kind in kinds_or_all(kinds) {
            handlers.entry(kind).or_default().push(Arc::clone(&handler));
        }
        tracing::debug!(handler = handler.name(), "handler subscribed");
    }

    async fn unsubscribe(&self, handler: &Arc<dyn EventHandler>, kinds: &[EventKind]) {
        let mut handlers = self.handlers.write().await;
        for kind in kinds_or_all(kinds) {
            if let Some(list) = handlers.get_mut(&kind) {
                list.retain(|h| !Arc::ptr_eq(h, handler));
            }
        }
    }
}

//! In-memory order read model.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{AggregateId, Page};
use domain::{Aggregate, Order, OrderEvent};
use event_store::EventEnvelope;
use tokio::sync::RwLock;

use crate::handler::EventHandler;
use crate::repository::{OrderFilter, OrderRepository, OrderView, ResettableRepository};
use crate::{ProjectionError, Result};

/// Read model kept in a map, for tests and database-less runs.
#[derive(Clone, Default)]
pub struct InMemoryOrderRepository {
    orders: Arc<RwLock<HashMap<AggregateId, OrderView>>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of rows.
    pub async fn count(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl EventHandler for InMemoryOrderRepository {
    fn name(&self) -> &'static str {
        "InMemoryOrderRepository"
    }

    async fn handle(&self, event: &EventEnvelope) -> Result<()> {
        if event.aggregate_type != Order::aggregate_type() {
            return Ok(());
        }

        let order_event: OrderEvent = event.decode()?;
        let mut orders = self.orders.write().await;

        match order_event {
            OrderEvent::OrderCreated(data) => {
                orders
                    .entry(data.order_id)
                    .or_insert_with(|| OrderView::from_created(data));
            }
            other => {
                let view = orders
                    .get_mut(&event.aggregate_id)
                    .ok_or(ProjectionError::MissingRow {
                        order_id: event.aggregate_id,
                    })?;
                view.apply(other);
            }
        }

        metrics::counter!("projections_events_processed").increment(1);
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn get_by_id(&self, id: AggregateId) -> Result<OrderView> {
        self.orders
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| ProjectionError::NotFound(id.to_string()))
    }

    async fn get_by_tracking_number(&self, tracking_number: &str) -> Result<OrderView> {
        self.orders
            .read()
            .await
            .values()
            .find(|view| view.tracking_number.as_str() == tracking_number)
            .cloned()
            .ok_or_else(|| ProjectionError::NotFound(tracking_number.to_string()))
    }

    async fn list_orders(&self, filter: OrderFilter) -> Result<Page<OrderView>> {
        let mut matching: Vec<OrderView> = self
            .orders
            .read()
            .await
            .values()
            .filter(|view| filter.matches(view))
            .cloned()
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.as_uuid().cmp(&b.id.as_uuid()))
        });

        let total = matching.len();
        let limit = if filter.limit == 0 {
            usize::MAX
        } else {
            filter.limit
        };
        let items = matching
            .into_iter()
            .skip(filter.offset)
            .take(limit)
            .collect();

        Ok(Page::new(items, total, filter.offset, filter.limit))
    }
}

#[async_trait]
impl ResettableRepository for InMemoryOrderRepository {
    async fn reset(&self) -> Result<()> {
        self.orders.write().await.clear();
        Ok(())
    }
}

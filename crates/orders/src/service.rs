//! Command and query entry points for orders.
//!
//! Commands follow one pipeline: load the history, rebuild the aggregate,
//! run the domain method, append the new events, publish them to the bus.
//! The command timeout ends at the append. Publication runs under its own
//! bound and never fails a command whose events are stored; it only leaves
//! the read model behind until the next rebuild.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use common::{AggregateId, Clock, Page, SystemClock};
use domain::{
    Aggregate, CustomerId, Location, Order, OrderItem, OrderStatus, TrackingNumber, to_envelopes,
};
use event_store::{AppendOptions, EventEnvelope, EventStore};
use projections::{EventBus, OrderFilter, OrderRepository, OrderView};

use crate::config::OrderServiceConfig;
use crate::error::{Result, ServiceError};
use crate::history::HistoryEntry;

/// Coordinates the event store, the read model and the event bus.
pub struct OrderService<S: EventStore> {
    store: S,
    repository: Arc<dyn OrderRepository>,
    bus: Arc<dyn EventBus>,
    clock: Arc<dyn Clock>,
    config: OrderServiceConfig,
}

impl<S: EventStore> OrderService<S> {
    pub fn new(store: S, repository: Arc<dyn OrderRepository>, bus: Arc<dyn EventBus>) -> Self {
        Self {
            store,
            repository,
            bus,
            clock: Arc::new(SystemClock),
            config: OrderServiceConfig::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: OrderServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &OrderServiceConfig {
        &self.config
    }

    /// Registers a new order and returns its ID and tracking number.
    ///
    /// A rejected request may still consume a tracking sequence value.
    #[tracing::instrument(skip(self, origin, destination, items), fields(customer_id = %customer_id))]
    pub async fn create_order(
        &self,
        customer_id: CustomerId,
        origin: Location,
        destination: Location,
        items: Vec<OrderItem>,
    ) -> Result<(AggregateId, TrackingNumber)> {
        self.run_command("create_order", async {
            let sequence = self.store.next_tracking_sequence().await?;
            let tracking_number = TrackingNumber::from_sequence(sequence.unsigned_abs());

            let mut order = Order::create(
                customer_id,
                origin,
                destination,
                items,
                tracking_number.clone(),
                self.clock.now(),
            )?;
            let stored = self.commit(&mut order).await?;

            tracing::info!(
                order_id = %order.id(),
                tracking_number = %tracking_number,
                "order created"
            );
            Ok(((order.id(), tracking_number), stored))
        })
        .await
    }

    #[tracing::instrument(skip(self, location, note), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn update_order_status(
        &self,
        order_id: AggregateId,
        new_status: OrderStatus,
        location: Option<Location>,
        note: Option<String>,
    ) -> Result<Order> {
        self.run_command("update_order_status", async {
            let mut order = self.load(order_id).await?;
            order.update_status(new_status, location, note, self.clock.now())?;
            let stored = self.commit(&mut order).await?;
            Ok((order, stored))
        })
        .await
    }

    #[tracing::instrument(skip(self, reason), fields(order_id = %order_id))]
    pub async fn cancel_order(&self, order_id: AggregateId, reason: Option<String>) -> Result<Order> {
        self.run_command("cancel_order", async {
            let mut order = self.load(order_id).await?;
            order.cancel(reason, self.clock.now())?;
            let stored = self.commit(&mut order).await?;
            Ok((order, stored))
        })
        .await
    }

    #[tracing::instrument(skip(self, note), fields(order_id = %order_id))]
    pub async fn add_order_note(&self, order_id: AggregateId, note: String) -> Result<Order> {
        self.run_command("add_order_note", async {
            let mut order = self.load(order_id).await?;
            order.add_note(note, self.clock.now())?;
            let stored = self.commit(&mut order).await?;
            Ok((order, stored))
        })
        .await
    }

    pub async fn get_order(&self, order_id: AggregateId) -> Result<OrderView> {
        self.run("get_order", async {
            Ok(self.repository.get_by_id(order_id).await?)
        })
        .await
    }

    pub async fn get_order_by_tracking(&self, tracking_number: &str) -> Result<OrderView> {
        self.run("get_order_by_tracking", async {
            Ok(self.repository.get_by_tracking_number(tracking_number).await?)
        })
        .await
    }

    pub async fn list_orders(&self, filter: OrderFilter) -> Result<Page<OrderView>> {
        self.run("list_orders", async {
            Ok(self.repository.list_orders(filter).await?)
        })
        .await
    }

    /// Reads an order's history straight from the event store.
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order_history(&self, order_id: AggregateId) -> Result<Vec<HistoryEntry>> {
        self.run("get_order_history", async {
            let events = self.history(order_id).await?;
            events
                .iter()
                .map(|envelope| {
                    HistoryEntry::from_envelope(envelope).map_err(|e| {
                        ServiceError::CorruptHistory {
                            order_id,
                            reason: format!("event {}: {e}", envelope.version),
                        }
                    })
                })
                .collect()
        })
        .await
    }

    async fn history(&self, order_id: AggregateId) -> Result<Vec<EventEnvelope>> {
        let events = self.store.get_events_for_aggregate(order_id).await?;
        if events.is_empty() {
            return Err(ServiceError::NotFound(order_id.to_string()));
        }
        Ok(events)
    }

    async fn load(&self, order_id: AggregateId) -> Result<Order> {
        let events = self.history(order_id).await?;
        Order::rebuild_from_envelopes(&events)?.ok_or_else(|| ServiceError::CorruptHistory {
            order_id,
            reason: "history does not start with ORDER_CREATED".to_string(),
        })
    }

    /// Appends the order's uncommitted events and returns them as stored.
    async fn commit(&self, order: &mut Order) -> Result<Vec<EventEnvelope>> {
        let envelopes = to_envelopes::<Order>(order.id(), order.uncommitted_events())?;
        let options = if self.config.optimistic_concurrency {
            AppendOptions::expect_version(order.version())
        } else {
            AppendOptions::new()
        };

        let stored = self.store.append(order.id(), envelopes, options).await?;
        if let Some(last) = stored.last() {
            order.set_version(last.version);
        }
        order.clear_uncommitted();
        Ok(stored)
    }

    /// Publishes stored events in order, giving up after the publish timeout.
    async fn publish_all(&self, events: &[EventEnvelope]) {
        let timeout = self.config.publish_timeout;
        let mut published = 0;
        let publishing = async {
            for event in events {
                self.publish(event).await;
                published += 1;
            }
        };

        if tokio::time::timeout(timeout, publishing).await.is_err() {
            let unpublished = events.len() - published;
            tracing::warn!(
                ?timeout,
                unpublished,
                order_id = ?events.first().map(|e| e.aggregate_id),
                "event publication timed out"
            );
            metrics::counter!("event_bus_publish_failures").increment(unpublished as u64);
        }
    }

    async fn publish(&self, event: &EventEnvelope) {
        if let Err(e) = self.bus.publish(event).await {
            tracing::warn!(
                error = %e,
                order_id = %event.aggregate_id,
                event_type = %event.event_type,
                version = %event.version,
                "failed to publish event"
            );
            metrics::counter!("event_bus_publish_failures").increment(1);
        }
    }

    /// Runs a command under the command timeout, then publishes what it stored.
    async fn run_command<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<(T, Vec<EventEnvelope>)>>,
    {
        let (value, stored) = self.run(operation, fut).await?;
        self.publish_all(&stored).await;
        Ok(value)
    }

    /// Runs an operation under the configured timeout and records its outcome.
    async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let timeout = self.config.command_timeout;

        let result = match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, ?timeout, "operation timed out");
                Err(ServiceError::Timeout(timeout))
            }
        };

        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!("orders_commands_total", "operation" => operation, "outcome" => outcome)
            .increment(1);
        metrics::histogram!("orders_command_duration_seconds", "operation" => operation)
            .record(start.elapsed().as_secs_f64());

        result
    }
}

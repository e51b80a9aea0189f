//! Order read model and the repository contract over it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AggregateId, Page};
use domain::{
    CustomerId, Location, OrderCreatedData, OrderEvent, OrderItem, OrderStatus, TrackingNumber,
};
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::handler::EventHandler;

/// Denormalized order row served to readers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderView {
    pub id: AggregateId,
    pub customer_id: CustomerId,
    pub tracking_number: TrackingNumber,
    pub status: OrderStatus,
    pub origin: Location,
    pub destination: Location,
    pub current_location: Option<Location>,
    pub items: Vec<OrderItem>,
    pub notes: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderView {
    /// Builds the initial row for a newly created order.
    pub fn from_created(data: OrderCreatedData) -> Self {
        Self {
            id: data.order_id,
            customer_id: data.customer_id,
            tracking_number: data.tracking_number,
            status: OrderStatus::Created,
            origin: data.origin,
            destination: data.destination,
            current_location: None,
            items: data.items,
            notes: Vec::new(),
            created_at: data.created_at,
            updated_at: data.created_at,
        }
    }

    /// Folds an update event into the row. Creation events are ignored.
    pub fn apply(&mut self, event: OrderEvent) {
        match event {
            OrderEvent::OrderCreated(_) => {}
            OrderEvent::OrderStatusUpdated(data) => {
                self.status = data.new_status;
                self.updated_at = data.updated_at;
                if let Some(location) = data.location {
                    self.current_location = Some(location);
                }
                if let Some(note) = data.note {
                    self.notes.push(note);
                }
            }
            OrderEvent::OrderCancelled(data) => {
                self.status = OrderStatus::Cancelled;
                self.updated_at = data.cancelled_at;
                if let Some(reason) = data.reason {
                    self.notes.push(reason);
                }
            }
            OrderEvent::OrderNoteAdded(data) => {
                self.notes.push(data.note);
                self.updated_at = data.added_at;
            }
        }
    }
}

/// Criteria for listing orders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub customer_id: Option<CustomerId>,
    pub status: Option<OrderStatus>,
    pub offset: usize,
    /// Maximum rows to return; 0 means no limit.
    pub limit: usize,
}

impl OrderFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Returns true if `view` satisfies the customer and status criteria.
    pub fn matches(&self, view: &OrderView) -> bool {
        if let Some(ref customer_id) = self.customer_id
            && &view.customer_id != customer_id
        {
            return false;
        }
        if let Some(status) = self.status
            && view.status != status
        {
            return false;
        }
        true
    }
}

/// Query side of the order read model.
///
/// Every repository is also an [`EventHandler`] so it can be subscribed to
/// the event bus and kept current.
#[async_trait]
pub trait OrderRepository: EventHandler {
    /// Looks up an order by ID.
    async fn get_by_id(&self, id: AggregateId) -> Result<OrderView>;

    /// Looks up an order by tracking number.
    async fn get_by_tracking_number(&self, tracking_number: &str) -> Result<OrderView>;

    /// Lists orders newest first, with the total count of matching rows.
    async fn list_orders(&self, filter: OrderFilter) -> Result<Page<OrderView>>;
}

/// A read model that can be wiped before a replay.
#[async_trait]
pub trait ResettableRepository: OrderRepository {
    /// Removes every row.
    async fn reset(&self) -> Result<()>;
}

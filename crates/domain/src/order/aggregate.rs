//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::{EventEnvelope, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::error::DomainError;

use super::{
    CustomerId, Location, OrderError, OrderEvent, OrderItem, OrderStatus, TrackingNumber,
    events::{OrderCancelledData, OrderCreatedData, OrderNoteAddedData, OrderStatusUpdatedData},
};

/// Order aggregate root.
///
/// Every mutation goes through a command method that validates, records an
/// [`OrderEvent`] and applies it, so live state and replayed state always
/// agree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: AggregateId,

    /// Version of the last persisted event applied.
    #[serde(default)]
    version: Version,

    customer_id: CustomerId,
    tracking_number: TrackingNumber,
    status: OrderStatus,
    origin: Location,
    destination: Location,
    current_location: Option<Location>,
    items: Vec<OrderItem>,
    notes: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,

    /// Events recorded since the aggregate was loaded or last committed.
    #[serde(skip)]
    uncommitted: Vec<OrderEvent>,
}

impl Aggregate for Order {
    type Event = OrderEvent;

    fn aggregate_type() -> &'static str {
        "Order"
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
            // Identity is fixed by the first event; a second creation is ignored.
            OrderEvent::OrderCreated(_) => {}
            OrderEvent::OrderStatusUpdated(data) => self.apply_status_updated(data),
            OrderEvent::OrderCancelled(data) => self.apply_cancelled(data),
            OrderEvent::OrderNoteAdded(data) => self.apply_note_added(data),
        }
    }
}

// Query methods
impl Order {
    /// Returns the customer ID.
    pub fn customer_id(&self) -> &CustomerId {
        &self.customer_id
    }

    /// Returns the tracking number.
    pub fn tracking_number(&self) -> &TrackingNumber {
        &self.tracking_number
    }

    /// Returns the current status.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns the pickup location.
    pub fn origin(&self) -> &Location {
        &self.origin
    }

    /// Returns the delivery location.
    pub fn destination(&self) -> &Location {
        &self.destination
    }

    /// Returns the last reported location, if any.
    pub fn current_location(&self) -> Option<&Location> {
        self.current_location.as_ref()
    }

    /// Returns the line items in order.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Returns the notes in the order they were added.
    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    /// Returns when the order was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the order last changed.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns true if the order is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Returns the events recorded but not yet committed.
    pub fn uncommitted_events(&self) -> &[OrderEvent] {
        &self.uncommitted
    }

    /// Forgets the uncommitted events once they have been persisted.
    pub fn clear_uncommitted(&mut self) {
        self.uncommitted.clear();
    }
}

// Command methods (record and return events)
impl Order {
    /// Registers a new order.
    ///
    /// The returned order holds exactly one uncommitted `OrderCreated` event.
    pub fn create(
        customer_id: CustomerId,
        origin: Location,
        destination: Location,
        items: Vec<OrderItem>,
        tracking_number: TrackingNumber,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if customer_id.is_blank() {
            return Err(OrderError::CustomerIdRequired);
        }
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }

        let data = OrderCreatedData {
            order_id: AggregateId::new(),
            customer_id,
            tracking_number,
            origin,
            destination,
            items,
            created_at: now,
        };

        let mut order = Self::from_created(data.clone());
        order.uncommitted.push(OrderEvent::OrderCreated(data));
        Ok(order)
    }

    /// Moves the order to `new_status`.
    pub fn update_status(
        &mut self,
        new_status: OrderStatus,
        location: Option<Location>,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.status.can_update() {
            return Err(OrderError::InvalidStateTransition {
                current_status: self.status,
                action: "update status",
            });
        }

        let note = note.filter(|n| !n.trim().is_empty());
        Ok(self.record(OrderEvent::status_updated(
            self.status,
            new_status,
            location,
            note,
            now,
        )))
    }

    /// Cancels the order.
    pub fn cancel(
        &mut self,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        match self.status {
            OrderStatus::Delivered => return Err(OrderError::CannotCancelDelivered),
            OrderStatus::Cancelled => return Err(OrderError::AlreadyCancelled),
            _ => {}
        }

        let reason = reason.filter(|r| !r.trim().is_empty());
        Ok(self.record(OrderEvent::order_cancelled(self.status, reason, now)))
    }

    /// Attaches a free-text note.
    pub fn add_note(
        &mut self,
        note: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        let note = note.into();
        if note.trim().is_empty() {
            return Err(OrderError::EmptyNote);
        }

        Ok(self.record(OrderEvent::note_added(note, now)))
    }

    fn record(&mut self, event: OrderEvent) -> Vec<OrderEvent> {
        self.apply(event.clone());
        self.uncommitted.push(event.clone());
        vec![event]
    }
}

// Replay
impl Order {
    /// Folds an ordered event history into an order.
    ///
    /// Returns `None` for an empty history or one that does not start with
    /// `OrderCreated`.
    pub fn rebuild(events: impl IntoIterator<Item = OrderEvent>) -> Option<Self> {
        let mut events = events.into_iter();
        let OrderEvent::OrderCreated(data) = events.next()? else {
            return None;
        };

        let mut order = Self::from_created(data);
        order.apply_events(events);
        Some(order)
    }

    /// Decodes stored envelopes and folds them into an order.
    ///
    /// Any undecodable payload fails the whole rebuild. On success the
    /// order's version is that of the last envelope.
    pub fn rebuild_from_envelopes(envelopes: &[EventEnvelope]) -> Result<Option<Self>, DomainError> {
        let events = envelopes
            .iter()
            .map(|envelope| {
                envelope
                    .decode::<OrderEvent>()
                    .map_err(|source| DomainError::CorruptEvent {
                        aggregate_id: envelope.aggregate_id,
                        version: envelope.version,
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut order = Self::rebuild(events);
        if let (Some(order), Some(last)) = (order.as_mut(), envelopes.last()) {
            order.set_version(last.version);
        }
        Ok(order)
    }
}

// Apply event helpers
impl Order {
    fn from_created(data: OrderCreatedData) -> Self {
        Self {
            id: data.order_id,
            version: Version::initial(),
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
            uncommitted: Vec::new(),
        }
    }

    fn apply_status_updated(&mut self, data: OrderStatusUpdatedData) {
        self.status = data.new_status;
        self.updated_at = data.updated_at;
        if let Some(location) = data.location {
            self.current_location = Some(location);
        }
        if let Some(note) = data.note {
            self.notes.push(note);
        }
    }

    fn apply_cancelled(&mut self, data: OrderCancelledData) {
        self.status = OrderStatus::Cancelled;
        self.updated_at = data.cancelled_at;
        if let Some(reason) = data.reason {
            self.notes.push(reason);
        }
    }

    fn apply_note_added(&mut self, data: OrderNoteAddedData) {
        self.notes.push(data.note);
        self.updated_at = data.added_at;
    }
}

//! Order domain events.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{CustomerId, Location, OrderItem, OrderStatus, TrackingNumber};

/// Discriminant of [`OrderEvent`], used for routing and storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    OrderCreated,
    OrderStatusUpdated,
    OrderCancelled,
    OrderNoteAdded,
}

impl EventKind {
    /// Every kind an order can emit.
    pub fn all() -> [EventKind; 4] {
        [
            EventKind::OrderCreated,
            EventKind::OrderStatusUpdated,
            EventKind::OrderCancelled,
            EventKind::OrderNoteAdded,
        ]
    }

    /// Returns the stored event type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::OrderCreated => "ORDER_CREATED",
            EventKind::OrderStatusUpdated => "ORDER_STATUS_UPDATED",
            EventKind::OrderCancelled => "ORDER_CANCELLED",
            EventKind::OrderNoteAdded => "ORDER_NOTE_ADDED",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a stored event type is not an order event.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind: {0}")]
pub struct ParseEventKindError(pub String);

impl FromStr for EventKind {
    type Err = ParseEventKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::all()
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseEventKindError(s.to_string()))
    }
}

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was registered.
    #[serde(rename = "ORDER_CREATED")]
    OrderCreated(OrderCreatedData),

    /// Order moved to a new status.
    #[serde(rename = "ORDER_STATUS_UPDATED")]
    OrderStatusUpdated(OrderStatusUpdatedData),

    /// Order was cancelled.
    #[serde(rename = "ORDER_CANCELLED")]
    OrderCancelled(OrderCancelledData),

    /// A free-text note was attached.
    #[serde(rename = "ORDER_NOTE_ADDED")]
    OrderNoteAdded(OrderNoteAddedData),
}

impl OrderEvent {
    /// Returns the kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            OrderEvent::OrderCreated(_) => EventKind::OrderCreated,
            OrderEvent::OrderStatusUpdated(_) => EventKind::OrderStatusUpdated,
            OrderEvent::OrderCancelled(_) => EventKind::OrderCancelled,
            OrderEvent::OrderNoteAdded(_) => EventKind::OrderNoteAdded,
        }
    }
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        self.kind().as_str()
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderCreated(data) => data.created_at,
            OrderEvent::OrderStatusUpdated(data) => data.updated_at,
            OrderEvent::OrderCancelled(data) => data.cancelled_at,
            OrderEvent::OrderNoteAdded(data) => data.added_at,
        }
    }
}

/// Data for OrderCreated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreatedData {
    pub order_id: AggregateId,
    pub customer_id: CustomerId,
    pub tracking_number: TrackingNumber,
    pub origin: Location,
    pub destination: Location,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
}

/// Data for OrderStatusUpdated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusUpdatedData {
    pub old_status: OrderStatus,
    pub new_status: OrderStatus,

    /// Where the parcel was when the status changed, if reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    pub updated_at: DateTime<Utc>,
}

/// Data for OrderCancelled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCancelledData {
    /// Status the order had before it was cancelled.
    pub previous_status: OrderStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    pub cancelled_at: DateTime<Utc>,
}

/// Data for OrderNoteAdded event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderNoteAddedData {
    pub note: String,
    pub added_at: DateTime<Utc>,
}

// Convenience constructors for events
impl OrderEvent {
    /// Creates an OrderCreated event.
    pub fn order_created(
        order_id: AggregateId,
        customer_id: CustomerId,
        tracking_number: TrackingNumber,
        origin: Location,
        destination: Location,
        items: Vec<OrderItem>,
        created_at: DateTime<Utc>,
    ) -> Self {
        OrderEvent::OrderCreated(OrderCreatedData {
            order_id,
            customer_id,
            tracking_number,
            origin,
            destination,
            items,
            created_at,
        })
    }

    /// Creates an OrderStatusUpdated event.
    pub fn status_updated(
        old_status: OrderStatus,
        new_status: OrderStatus,
        location: Option<Location>,
        note: Option<String>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        OrderEvent::OrderStatusUpdated(OrderStatusUpdatedData {
            old_status,
            new_status,
            location,
            note,
            updated_at,
        })
    }

    /// Creates an OrderCancelled event.
    pub fn order_cancelled(
        previous_status: OrderStatus,
        reason: Option<String>,
        cancelled_at: DateTime<Utc>,
    ) -> Self {
        OrderEvent::OrderCancelled(OrderCancelledData {
            previous_status,
            reason,
            cancelled_at,
        })
    }

    /// Creates an OrderNoteAdded event.
    pub fn note_added(note: impl Into<String>, added_at: DateTime<Utc>) -> Self {
        OrderEvent::OrderNoteAdded(OrderNoteAddedData {
            note: note.into(),
            added_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(at: DateTime<Utc>) -> OrderEvent {
        OrderEvent::order_created(
            AggregateId::new(),
            CustomerId::new("C1"),
            TrackingNumber::from_sequence(1),
            Location::new("1 Dock Rd", "Hanoi", 21.0, 105.8),
            Location::new("9 Pier St", "Da Nang", 16.0, 108.2),
            vec![OrderItem::new("SKU-1", "Box", 2, 1.0, 10.0)],
            at,
        )
    }

    #[test]
    fn test_event_type() {
        let now = Utc::now();
        assert_eq!(created(now).event_type(), "ORDER_CREATED");

        let event = OrderEvent::status_updated(
            OrderStatus::Created,
            OrderStatus::InTransit,
            None,
            None,
            now,
        );
        assert_eq!(event.event_type(), "ORDER_STATUS_UPDATED");

        let event = OrderEvent::order_cancelled(OrderStatus::Created, None, now);
        assert_eq!(event.event_type(), "ORDER_CANCELLED");

        let event = OrderEvent::note_added("fragile", now);
        assert_eq!(event.event_type(), "ORDER_NOTE_ADDED");
        assert_eq!(event.occurred_at(), now);
    }

    #[test]
    fn test_event_kind_round_trips_through_str() {
        for kind in EventKind::all() {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!("OrderCreated".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_payload_tag_matches_event_type() {
        let event = OrderEvent::status_updated(
            OrderStatus::Processing,
            OrderStatus::InTransit,
            Some(Location::new("Hub 3", "Hue", 16.4, 107.5)),
            Some("left warehouse".into()),
            Utc::now(),
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ORDER_STATUS_UPDATED");
        assert_eq!(json["data"]["old_status"], "PROCESSING");
        assert_eq!(json["data"]["new_status"], "IN_TRANSIT");
        assert_eq!(json["data"]["note"], "left warehouse");

        let back: OrderEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let event = OrderEvent::order_cancelled(OrderStatus::InTransit, None, Utc::now());
        let json = serde_json::to_value(&event).unwrap();
        assert!(json["data"].get("reason").is_none());
    }

    #[test]
    fn test_unknown_kind_fails_to_decode() {
        let json = serde_json::json!({"type": "ORDER_TELEPORTED", "data": {}});
        assert!(serde_json::from_value::<OrderEvent>(json).is_err());
    }
}

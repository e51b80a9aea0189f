//! Human-readable order history derived from the event log.

use chrono::{DateTime, Utc};
use domain::{Location, OrderEvent, OrderStatus};
use event_store::EventEnvelope;
use serde::Serialize;

/// One line of an order's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl HistoryEntry {
    pub const CREATED_NOTE: &'static str = "Order created";

    /// Decodes a stored envelope and summarises it.
    pub fn from_envelope(envelope: &EventEnvelope) -> Result<Self, serde_json::Error> {
        let event: OrderEvent = envelope.decode()?;
        Ok(Self::from_event(event, envelope.timestamp))
    }

    pub fn from_event(event: OrderEvent, timestamp: DateTime<Utc>) -> Self {
        let mut entry = Self {
            timestamp,
            event_type: event.kind().as_str().to_string(),
            status: None,
            prev_status: None,
            location: None,
            note: None,
        };

        match event {
            OrderEvent::OrderCreated(_) => {
                entry.status = Some(OrderStatus::Created);
                entry.note = Some(Self::CREATED_NOTE.to_string());
            }
            OrderEvent::OrderStatusUpdated(data) => {
                entry.status = Some(data.new_status);
                entry.prev_status = Some(data.old_status);
                entry.location = data.location;
                entry.note = data.note;
            }
            OrderEvent::OrderCancelled(data) => {
                entry.status = Some(OrderStatus::Cancelled);
                entry.prev_status = Some(data.previous_status);
                entry.note = data.reason;
            }
            OrderEvent::OrderNoteAdded(data) => {
                entry.note = Some(data.note);
            }
        }

        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::AggregateId;
    use domain::{CustomerId, OrderItem, TrackingNumber};

    fn location(city: &str) -> Location {
        Location::new("1 Main St", city, 0.0, 0.0)
    }

    #[test]
    fn created_entry_has_fixed_note() {
        let now = Utc::now();
        let event = OrderEvent::order_created(
            AggregateId::new(),
            CustomerId::new("CUST-1"),
            TrackingNumber::from_sequence(1),
            location("Hanoi"),
            location("Hue"),
            vec![OrderItem::new("SKU-1", "Box", 1, 1.0, 1.0)],
            now,
        );

        let entry = HistoryEntry::from_event(event, now);

        assert_eq!(entry.event_type, "ORDER_CREATED");
        assert_eq!(entry.status, Some(OrderStatus::Created));
        assert_eq!(entry.note.as_deref(), Some("Order created"));
        assert!(entry.prev_status.is_none());
    }

    #[test]
    fn status_update_carries_both_statuses() {
        let now = Utc::now();
        let event = OrderEvent::status_updated(
            OrderStatus::Created,
            OrderStatus::InTransit,
            Some(location("Vinh")),
            Some("left hub".to_string()),
            now,
        );

        let entry = HistoryEntry::from_event(event, now);

        assert_eq!(entry.status, Some(OrderStatus::InTransit));
        assert_eq!(entry.prev_status, Some(OrderStatus::Created));
        assert_eq!(entry.location.map(|l| l.city), Some("Vinh".to_string()));
        assert_eq!(entry.note.as_deref(), Some("left hub"));
    }

    #[test]
    fn note_entry_omits_status_in_json() {
        let now = Utc::now();
        let entry = HistoryEntry::from_event(OrderEvent::note_added("fragile", now), now);

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["event_type"], "ORDER_NOTE_ADDED");
        assert_eq!(json["note"], "fragile");
        assert!(json.get("status").is_none());
        assert!(json.get("location").is_none());
    }
}

//! Order status machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The delivery status of an order.
///
/// Any non-terminal status may move to any other status; `Delivered` and
/// `Cancelled` are terminal.
///
/// ```text
/// Created ─► Processing ─► InTransit ─► OutForDelivery ─► Delivered
///    │            │            │              │
///    └────────────┴──── Exception ────────────┴──────────► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order has been registered but not yet picked up.
    #[default]
    Created,

    /// Order is being prepared at the origin warehouse.
    Processing,

    /// Order is moving between hubs.
    InTransit,

    /// Order is on the last-mile vehicle.
    OutForDelivery,

    /// Order has reached the recipient (terminal state).
    Delivered,

    /// Something went wrong in transit and needs attention.
    Exception,

    /// Order was cancelled (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Created,
        OrderStatus::Processing,
        OrderStatus::InTransit,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Exception,
        OrderStatus::Cancelled,
    ];

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Returns true if the status may still be updated.
    pub fn can_update(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the order can be cancelled in this state.
    pub fn can_cancel(&self) -> bool {
        !matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Returns the wire representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::InTransit => "IN_TRANSIT",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Exception => "EXCEPTION",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when a string does not name an order status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status: {0}")]
pub struct ParseOrderStatusError(pub String);

impl FromStr for OrderStatus {
    type Err = ParseOrderStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseOrderStatusError(s.to_string()))
    }
}

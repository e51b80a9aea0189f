//! Order aggregate and related types.

mod aggregate;
mod events;
mod status;
mod value_objects;

pub use aggregate::Order;
pub use events::{
    EventKind, OrderCancelledData, OrderCreatedData, OrderEvent, OrderNoteAddedData,
    OrderStatusUpdatedData, ParseEventKindError,
};
pub use status::{OrderStatus, ParseOrderStatusError};
pub use value_objects::{CustomerId, Location, OrderItem, TrackingNumber};

use thiserror::Error;

/// Business rule violations raised by order commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Customer ID is required.
    #[error("customer ID is required")]
    CustomerIdRequired,

    /// Order has no items.
    #[error("order must contain at least one item")]
    NoItems,

    /// The order's status does not allow the action.
    #[error("invalid state transition: cannot {action} from {current_status}")]
    InvalidStateTransition {
        current_status: OrderStatus,
        action: &'static str,
    },

    #[error("cannot cancel a delivered order")]
    CannotCancelDelivered,

    #[error("order is already cancelled")]
    AlreadyCancelled,

    #[error("note must not be empty")]
    EmptyNote,
}

//! Domain layer for order tracking.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits for event-sourced entities
//! - The Order aggregate with its status machine and events
//! - Value objects shared by the write and read sides

pub mod aggregate;
pub mod error;
pub mod order;

pub use aggregate::{Aggregate, DomainEvent, to_envelopes};
pub use error::DomainError;
pub use order::{
    CustomerId, EventKind, Location, Order, OrderCancelledData, OrderCreatedData, OrderError,
    OrderEvent, OrderItem, OrderNoteAddedData, OrderStatus, OrderStatusUpdatedData,
    ParseEventKindError, ParseOrderStatusError, TrackingNumber,
};

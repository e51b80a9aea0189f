//! Read side of the order tracking system.
//!
//! This crate provides:
//! - [`EventHandler`] and the in-process [`InMemoryEventBus`]
//! - [`OrderRepository`], the query contract over the order read model
//! - In-memory and PostgreSQL read models that keep themselves current by
//!   handling published events
//! - [`ProjectionRebuilder`] for replaying the event log into a read model

pub mod bus;
pub mod error;
pub mod handler;
pub mod memory;
pub mod postgres;
pub mod rebuild;
pub mod repository;

pub use bus::{EventBus, InMemoryEventBus};
pub use error::{ProjectionError, Result};
pub use handler::EventHandler;
pub use memory::InMemoryOrderRepository;
pub use postgres::PostgresOrderRepository;
pub use rebuild::{ProjectionRebuilder, RebuildStats};
pub use repository::{OrderFilter, OrderRepository, OrderView, ResettableRepository};

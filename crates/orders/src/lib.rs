//! Order service for the logistics order tracker.
//!
//! [`OrderService`] is the only writer: it turns commands into events on the
//! event store, pushes them through the event bus to the read model, and
//! answers queries from the read model and the event log.

pub mod config;
pub mod error;
pub mod history;
pub mod service;

pub use config::OrderServiceConfig;
pub use error::{Result, ServiceError};
pub use history::HistoryEntry;
pub use service::OrderService;

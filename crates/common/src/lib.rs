//! Shared types used across the order tracking workspace.

pub mod clock;
pub mod page;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use page::Page;
pub use types::{AggregateId, ParseAggregateIdError};

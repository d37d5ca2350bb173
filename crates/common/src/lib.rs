//! Shared types for the bookstore checkout service.

pub mod money;
pub mod status;
pub mod types;

pub use money::Money;
pub use status::{OrderStatus, UnknownStatus};
pub use types::{BookId, OrderId, UserId};

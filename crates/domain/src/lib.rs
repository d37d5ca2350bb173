//! Domain layer for the bookstore checkout service.
//!
//! This crate provides:
//! - The cart snapshot reader and the checkout planner that turns a cart
//!   into stock updates, an order and cart deletions
//! - The order projector producing caller-facing order views
//! - The order status guard
//! - `CheckoutService`, which drives checkout against a store with
//!   bounded retries on commit conflicts

pub mod checkout;
pub mod error;
pub mod order;
pub mod service;

pub use checkout::{CartSnapshot, RetryPolicy, plan_checkout};
pub use common::{BookId, Money, OrderId, OrderStatus, UserId};
pub use error::CheckoutError;
pub use order::{OrderItemView, OrderView, parse_status};
pub use service::CheckoutService;

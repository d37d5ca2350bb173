//! Domain error types.

use common::{BookId, OrderId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during checkout and order management.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The user's cart has no items.
    #[error("Cart is empty.")]
    EmptyCart,

    /// A cart line asks for more units than the book has in stock.
    #[error("Insufficient stock for {title}")]
    InsufficientStock {
        book_id: BookId,
        title: String,
        requested: u32,
        available: u32,
    },

    /// The order total does not fit in the money representation.
    #[error("Order total is too large.")]
    AmountOverflow,

    /// A status name outside Pending, Shipped, Delivered.
    #[error("Invalid order status '{0}'. Allowed values are Pending, Shipped, Delivered.")]
    InvalidStatus(String),

    /// The order does not exist.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// Every commit attempt lost a race with a concurrent writer.
    #[error("Checkout could not complete after {attempts} attempts due to concurrent updates")]
    Transient { attempts: u32 },

    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CheckoutError {
    /// Short stable name, used as a metrics label.
    pub fn kind(&self) -> &'static str {
        match self {
            CheckoutError::EmptyCart => "empty_cart",
            CheckoutError::InsufficientStock { .. } => "insufficient_stock",
            CheckoutError::AmountOverflow => "amount_overflow",
            CheckoutError::InvalidStatus(_) => "invalid_status",
            CheckoutError::NotFound(_) => "not_found",
            CheckoutError::Transient { .. } => "transient",
            CheckoutError::Store(_) => "store",
        }
    }
}

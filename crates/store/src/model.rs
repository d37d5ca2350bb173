//! Rows read from and written to the store.

use chrono::{DateTime, Utc};

use crate::{BookId, Money, OrderId, OrderStatus, UserId};

/// A catalog book as currently stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub price: Money,
    pub stock_quantity: u32,
    /// Bumped on every write to the row. Commits compare against it.
    pub version: i64,
}

/// Catalog data for a book that has not been stored yet.
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub price: Money,
    pub stock_quantity: u32,
}

impl NewBook {
    pub fn new(title: impl Into<String>, price: Money, stock_quantity: u32) -> Self {
        Self {
            title: title.into(),
            price,
            stock_quantity,
        }
    }
}

/// A raw cart row: how many units of a book a user intends to buy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartItem {
    pub book_id: BookId,
    pub quantity: u32,
}

/// A cart row joined with the live state of the book it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub book_id: BookId,
    pub quantity: u32,
    pub title: String,
    pub price: Money,
    pub stock_quantity: u32,
    pub book_version: i64,
}

/// Sets a book's stock, provided the row is still at `expected_version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockUpdate {
    pub book_id: BookId,
    pub expected_version: i64,
    pub new_stock: u32,
}

/// Removes a cart row, provided it still holds `quantity` units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumedCartItem {
    pub book_id: BookId,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub book_id: BookId,
    pub quantity: u32,
    pub unit_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub status: OrderStatus,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
    pub items: Vec<NewOrderItem>,
}

/// Every write a single checkout performs.
///
/// Applied as one unit: either all stock updates, the order insert and the
/// cart deletions become durable together, or none of them does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutCommit {
    pub user_id: UserId,
    pub stock_updates: Vec<StockUpdate>,
    pub order: NewOrder,
    pub consumed_cart: Vec<ConsumedCartItem>,
}

/// An order line as stored, with the referenced book's current title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItemRecord {
    pub book_id: BookId,
    /// `None` when the book no longer exists.
    pub title: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
}

/// A persisted order together with its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRecord {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemRecord>,
}

//! Order projector.

use chrono::{DateTime, Utc};
use common::{BookId, Money, OrderId, OrderStatus};
use serde::{Deserialize, Serialize};
use store::{OrderItemRecord, OrderRecord};

/// Caller-facing representation of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: OrderId,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub items: Vec<OrderItemView>,
}

/// One order line.
///
/// `unit_price` is the price the book had at checkout; `title` is the
/// book's title as it is now, or empty if the book no longer exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemView {
    pub book_id: BookId,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Money,
}

impl From<OrderItemRecord> for OrderItemView {
    fn from(item: OrderItemRecord) -> Self {
        Self {
            book_id: item.book_id,
            title: item.title.unwrap_or_default(),
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

impl From<OrderRecord> for OrderView {
    fn from(order: OrderRecord) -> Self {
        Self {
            id: order.id,
            created_at: order.created_at,
            status: order.status,
            total_amount: order.total_amount,
            items: order.items.into_iter().map(OrderItemView::from).collect(),
        }
    }
}

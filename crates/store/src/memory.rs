use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{
    Book, BookId, CartItem, CartLine, CheckoutCommit, Money, NewBook, NewOrderItem, OrderId,
    OrderItemRecord, OrderRecord, OrderStatus, Result, StoreError, UserId,
    store::{BookstoreStore, validate_commit, validate_price},
};

#[derive(Debug, Clone)]
struct StoredOrder {
    user_id: UserId,
    status: OrderStatus,
    total_amount: Money,
    created_at: DateTime<Utc>,
    items: Vec<NewOrderItem>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    books: BTreeMap<BookId, Book>,
    carts: BTreeMap<(UserId, BookId), u32>,
    orders: BTreeMap<OrderId, StoredOrder>,
    next_book_id: i64,
    next_order_id: i64,
    injected_conflicts: u32,
}

impl InMemoryState {
    fn to_record(&self, id: OrderId, order: &StoredOrder) -> OrderRecord {
        OrderRecord {
            id,
            user_id: order.user_id,
            status: order.status,
            total_amount: order.total_amount,
            created_at: order.created_at,
            items: order
                .items
                .iter()
                .map(|item| OrderItemRecord {
                    book_id: item.book_id,
                    title: self.books.get(&item.book_id).map(|b| b.title.clone()),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                })
                .collect(),
        }
    }

    /// Checks every precondition of a commit without mutating anything.
    fn check_commit(&self, commit: &CheckoutCommit) -> Result<()> {
        for update in &commit.stock_updates {
            let book = self
                .books
                .get(&update.book_id)
                .ok_or(StoreError::BookNotFound(update.book_id))?;
            if book.version != update.expected_version {
                return Err(StoreError::conflict(format!(
                    "book {} is at version {}, expected {}",
                    update.book_id, book.version, update.expected_version
                )));
            }
        }

        for consumed in &commit.consumed_cart {
            let current = self.carts.get(&(commit.user_id, consumed.book_id));
            if current != Some(&consumed.quantity) {
                return Err(StoreError::conflict(format!(
                    "cart row for book {} changed since it was read",
                    consumed.book_id
                )));
            }
        }

        Ok(())
    }
}

/// In-memory store implementation.
///
/// Holds all rows behind one lock and provides the same commit guarantees
/// as the PostgreSQL implementation. Used by tests and when the service
/// runs without a database.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` checkout commits fail with a concurrency
    /// conflict, as if another writer had raced them.
    pub async fn inject_conflicts(&self, count: u32) {
        self.state.write().await.injected_conflicts = count;
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }
}

#[async_trait]
impl BookstoreStore for InMemoryStore {
    async fn insert_book(&self, book: NewBook) -> Result<BookId> {
        validate_price(book.price)?;
        let mut state = self.state.write().await;
        state.next_book_id += 1;
        let id = BookId::new(state.next_book_id);
        state.books.insert(
            id,
            Book {
                id,
                title: book.title,
                price: book.price,
                stock_quantity: book.stock_quantity,
                version: 1,
            },
        );
        Ok(id)
    }

    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>> {
        Ok(self.state.read().await.books.get(&book_id).cloned())
    }

    async fn update_book_price(&self, book_id: BookId, price: Money) -> Result<bool> {
        validate_price(price)?;
        let mut state = self.state.write().await;
        match state.books.get_mut(&book_id) {
            Some(book) => {
                book.price = price;
                book.version += 1;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_cart_item(&self, user_id: UserId, book_id: BookId, quantity: u32) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.books.contains_key(&book_id) {
            return Err(StoreError::BookNotFound(book_id));
        }
        if quantity == 0 {
            state.carts.remove(&(user_id, book_id));
        } else {
            state.carts.insert((user_id, book_id), quantity);
        }
        Ok(())
    }

    async fn cart_items(&self, user_id: UserId) -> Result<Vec<CartItem>> {
        let state = self.state.read().await;
        Ok(state
            .carts
            .range((user_id, BookId::new(i64::MIN))..=(user_id, BookId::new(i64::MAX)))
            .map(|(&(_, book_id), &quantity)| CartItem { book_id, quantity })
            .collect())
    }

    async fn load_cart(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let state = self.state.read().await;
        let mut lines = Vec::new();
        for (&(_, book_id), &quantity) in state
            .carts
            .range((user_id, BookId::new(i64::MIN))..=(user_id, BookId::new(i64::MAX)))
        {
            let Some(book) = state.books.get(&book_id) else {
                tracing::warn!(%user_id, %book_id, "cart references a missing book");
                continue;
            };
            lines.push(CartLine {
                book_id,
                quantity,
                title: book.title.clone(),
                price: book.price,
                stock_quantity: book.stock_quantity,
                book_version: book.version,
            });
        }
        Ok(lines)
    }

    async fn commit_checkout(&self, commit: CheckoutCommit) -> Result<OrderId> {
        validate_commit(&commit).map_err(|e| StoreError::InvalidCommit(e.message))?;

        let mut state = self.state.write().await;

        if state.injected_conflicts > 0 {
            state.injected_conflicts -= 1;
            return Err(StoreError::conflict("injected conflict"));
        }

        // All checks run before the first write so a rejected commit leaves
        // the state untouched.
        state.check_commit(&commit)?;

        for update in &commit.stock_updates {
            if let Some(book) = state.books.get_mut(&update.book_id) {
                book.stock_quantity = update.new_stock;
                book.version += 1;
            }
        }

        for consumed in &commit.consumed_cart {
            state.carts.remove(&(commit.user_id, consumed.book_id));
        }

        state.next_order_id += 1;
        let order_id = OrderId::new(state.next_order_id);
        state.orders.insert(
            order_id,
            StoredOrder {
                user_id: commit.user_id,
                status: commit.order.status,
                total_amount: commit.order.total_amount,
                created_at: commit.order.created_at,
                items: commit.order.items,
            },
        );

        Ok(order_id)
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .get(&order_id)
            .map(|order| state.to_record(order_id, order)))
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderRecord>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .filter(|(_, order)| order.user_id == user_id)
            .map(|(&id, order)| state.to_record(id, order))
            .collect())
    }

    async fn list_orders(&self) -> Result<Vec<OrderRecord>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .map(|(&id, order)| state.to_record(id, order))
            .collect())
    }

    async fn update_order_status(&self, order_id: OrderId, status: OrderStatus) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.orders.get_mut(&order_id) {
            Some(order) => {
                order.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

use async_trait::async_trait;

use crate::{
    Book, BookId, CartItem, CartLine, CheckoutCommit, Money, NewBook, OrderId, OrderRecord,
    OrderStatus, Result, StoreError, UserId,
};

/// Persistence gateway for the checkout workflow.
///
/// Implementations must be thread-safe (Send + Sync); requests share one
/// store and call it concurrently.
#[async_trait]
pub trait BookstoreStore: Send + Sync {
    /// Adds a book to the catalog and returns its identifier.
    async fn insert_book(&self, book: NewBook) -> Result<BookId>;

    /// Retrieves a book by identifier.
    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>>;

    /// Changes a book's price. Returns false if the book does not exist.
    ///
    /// Existing order lines keep the price they were created with.
    async fn update_book_price(&self, book_id: BookId, price: Money) -> Result<bool>;

    /// Sets how many units of a book are in a user's cart.
    ///
    /// A quantity of zero removes the cart row.
    async fn set_cart_item(&self, user_id: UserId, book_id: BookId, quantity: u32) -> Result<()>;

    /// Returns the raw cart rows for a user, ordered by book id.
    async fn cart_items(&self, user_id: UserId) -> Result<Vec<CartItem>>;

    /// Returns the user's cart joined with each book's current title, price,
    /// stock quantity and version, ordered by book id.
    async fn load_cart(&self, user_id: UserId) -> Result<Vec<CartLine>>;

    /// Applies a checkout atomically and returns the new order's id.
    ///
    /// Fails with `ConcurrencyConflict` without writing anything if any book
    /// in `stock_updates` is no longer at its expected version, or if any
    /// consumed cart row no longer holds the expected quantity.
    async fn commit_checkout(&self, commit: CheckoutCommit) -> Result<OrderId>;

    /// Retrieves an order with its lines.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>>;

    /// Retrieves all orders placed by a user, ordered by id.
    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderRecord>>;

    /// Retrieves every order, ordered by id.
    async fn list_orders(&self) -> Result<Vec<OrderRecord>>;

    /// Overwrites an order's status. Returns false if the order does not exist.
    async fn update_order_status(&self, order_id: OrderId, status: OrderStatus) -> Result<bool>;
}

/// Error returned when a checkout commit is internally inconsistent.
#[derive(Debug, Clone)]
pub struct CommitValidationError {
    pub message: String,
}

impl std::fmt::Display for CommitValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Commit validation error: {}", self.message)
    }
}

impl std::error::Error for CommitValidationError {}

/// Rejects a catalog price the books table would refuse.
pub(crate) fn validate_price(price: Money) -> Result<()> {
    if price.is_negative() {
        return Err(StoreError::InvalidBook(format!(
            "Price cannot be negative: {price}"
        )));
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> CommitValidationError {
    CommitValidationError {
        message: message.into(),
    }
}

/// Validates a checkout commit before it is applied.
pub fn validate_commit(commit: &CheckoutCommit) -> std::result::Result<(), CommitValidationError> {
    if commit.order.items.is_empty() {
        return Err(invalid("Cannot commit an order without items"));
    }

    if commit.stock_updates.len() != commit.order.items.len()
        || commit.consumed_cart.len() != commit.order.items.len()
    {
        return Err(invalid(
            "Every order line needs exactly one stock update and one consumed cart row",
        ));
    }

    // Stock updates must be sorted by book so concurrent commits lock rows
    // in the same order.
    if commit
        .stock_updates
        .windows(2)
        .any(|pair| pair[0].book_id >= pair[1].book_id)
    {
        return Err(invalid("Stock updates must be sorted by book id without duplicates"));
    }

    for item in &commit.order.items {
        if item.quantity == 0 {
            return Err(invalid(format!("Order line for book {} has zero quantity", item.book_id)));
        }
        if item.unit_price.is_negative() {
            return Err(invalid(format!("Order line for book {} has a negative price", item.book_id)));
        }
        if !commit.stock_updates.iter().any(|u| u.book_id == item.book_id) {
            return Err(invalid(format!("Book {} has no stock update", item.book_id)));
        }
        if !commit
            .consumed_cart
            .iter()
            .any(|c| c.book_id == item.book_id && c.quantity == item.quantity)
        {
            return Err(invalid(format!("Book {} has no matching cart row", item.book_id)));
        }
    }

    let total = commit
        .order
        .items
        .iter()
        .try_fold(Money::zero(), |total, item| {
            item.unit_price
                .checked_multiply(item.quantity)
                .and_then(|line_total| total.checked_add(line_total))
        })
        .ok_or_else(|| invalid("Order total overflows"))?;
    if total != commit.order.total_amount {
        return Err(invalid(format!(
            "Order total {} does not match its lines ({})",
            commit.order.total_amount, total
        )));
    }

    Ok(())
}

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgPoolOptions, postgres::PgRow};

use crate::{
    Book, BookId, CartItem, CartLine, CheckoutCommit, Money, NewBook, OrderId, OrderItemRecord,
    OrderRecord, OrderStatus, Result, StoreError, UserId,
    store::{BookstoreStore, validate_commit, validate_price},
};

const ORDER_COLUMNS: &str = "id, user_id, status, total_amount_cents, created_at";

/// PostgreSQL-backed store implementation.
///
/// Checkout isolation comes from a compare-and-swap on `books.version`
/// inside one transaction: a stock update only applies if the row is still
/// at the version the cart was read at.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_book(row: &PgRow) -> Result<Book> {
        Ok(Book {
            id: BookId::new(row.try_get("id")?),
            title: row.try_get("title")?,
            price: Money::from_cents(row.try_get("price_cents")?),
            stock_quantity: to_u32(row.try_get("stock_quantity")?, "stock_quantity")?,
            version: row.try_get("version")?,
        })
    }

    fn row_to_order(row: &PgRow) -> Result<OrderRecord> {
        let status: String = row.try_get("status")?;
        let status = status
            .parse::<OrderStatus>()
            .map_err(|e| StoreError::InvalidRow(e.to_string()))?;

        Ok(OrderRecord {
            id: OrderId::new(row.try_get("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            status,
            total_amount: Money::from_cents(row.try_get("total_amount_cents")?),
            created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
            items: Vec::new(),
        })
    }

    /// Decodes order rows and attaches their lines with one extra query.
    async fn with_items(&self, rows: Vec<PgRow>) -> Result<Vec<OrderRecord>> {
        let mut orders = rows
            .iter()
            .map(Self::row_to_order)
            .collect::<Result<Vec<_>>>()?;
        if orders.is_empty() {
            return Ok(orders);
        }

        let ids: Vec<i64> = orders.iter().map(|o| o.id.as_i64()).collect();
        let item_rows = sqlx::query(
            r#"
            SELECT oi.order_id, oi.book_id, oi.quantity, oi.unit_price_cents, b.title
            FROM order_items oi
            LEFT JOIN books b ON b.id = oi.book_id
            WHERE oi.order_id = ANY($1)
            ORDER BY oi.id ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<i64, Vec<OrderItemRecord>> = HashMap::new();
        for row in item_rows {
            let order_id: i64 = row.try_get("order_id")?;
            items.entry(order_id).or_default().push(OrderItemRecord {
                book_id: BookId::new(row.try_get("book_id")?),
                title: row.try_get("title")?,
                quantity: to_u32(row.try_get("quantity")?, "quantity")?,
                unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            });
        }

        for order in &mut orders {
            order.items = items.remove(&order.id.as_i64()).unwrap_or_default();
        }
        Ok(orders)
    }
}

fn to_u32(value: i64, column: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::InvalidRow(format!("{column} out of range: {value}")))
}

/// Maps errors raised while a checkout transaction runs. Failures caused by
/// a concurrent writer become conflicts so the caller can retry.
fn map_commit_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.constraint() == Some("books_stock_non_negative") {
            return StoreError::conflict("stock would go negative");
        }
        // serialization_failure, deadlock_detected
        if matches!(db_err.code().as_deref(), Some("40001") | Some("40P01")) {
            return StoreError::conflict(db_err.message().to_string());
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl BookstoreStore for PostgresStore {
    async fn insert_book(&self, book: NewBook) -> Result<BookId> {
        validate_price(book.price)?;
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO books (title, price_cents, stock_quantity)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(&book.title)
        .bind(book.price.cents())
        .bind(i64::from(book.stock_quantity))
        .fetch_one(&self.pool)
        .await?;

        Ok(BookId::new(id))
    }

    async fn get_book(&self, book_id: BookId) -> Result<Option<Book>> {
        let row: Option<PgRow> = sqlx::query(
            "SELECT id, title, price_cents, stock_quantity, version FROM books WHERE id = $1",
        )
        .bind(book_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_book).transpose()
    }

    async fn update_book_price(&self, book_id: BookId, price: Money) -> Result<bool> {
        validate_price(price)?;
        let result =
            sqlx::query("UPDATE books SET price_cents = $1, version = version + 1 WHERE id = $2")
                .bind(price.cents())
                .bind(book_id.as_i64())
                .execute(&self.pool)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_cart_item(&self, user_id: UserId, book_id: BookId, quantity: u32) -> Result<()> {
        if quantity == 0 {
            sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND book_id = $2")
                .bind(user_id.as_i64())
                .bind(book_id.as_i64())
                .execute(&self.pool)
                .await?;
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO cart_items (user_id, book_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, book_id) DO UPDATE SET quantity = EXCLUDED.quantity
            "#,
        )
        .bind(user_id.as_i64())
        .bind(book_id.as_i64())
        .bind(i64::from(quantity))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("cart_items_book_id_fkey")
            {
                return StoreError::BookNotFound(book_id);
            }
            StoreError::Database(e)
        })?;

        Ok(())
    }

    async fn cart_items(&self, user_id: UserId) -> Result<Vec<CartItem>> {
        let rows = sqlx::query(
            "SELECT book_id, quantity FROM cart_items WHERE user_id = $1 ORDER BY book_id ASC",
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(CartItem {
                    book_id: BookId::new(row.try_get("book_id")?),
                    quantity: to_u32(row.try_get("quantity")?, "quantity")?,
                })
            })
            .collect()
    }

    async fn load_cart(&self, user_id: UserId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(
            r#"
            SELECT c.book_id, c.quantity, b.title, b.price_cents, b.stock_quantity, b.version
            FROM cart_items c
            JOIN books b ON b.id = c.book_id
            WHERE c.user_id = $1
            ORDER BY c.book_id ASC
            "#,
        )
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(CartLine {
                    book_id: BookId::new(row.try_get("book_id")?),
                    quantity: to_u32(row.try_get("quantity")?, "quantity")?,
                    title: row.try_get("title")?,
                    price: Money::from_cents(row.try_get("price_cents")?),
                    stock_quantity: to_u32(row.try_get("stock_quantity")?, "stock_quantity")?,
                    book_version: row.try_get("version")?,
                })
            })
            .collect()
    }

    async fn commit_checkout(&self, commit: CheckoutCommit) -> Result<OrderId> {
        validate_commit(&commit).map_err(|e| StoreError::InvalidCommit(e.message))?;

        // Dropping the transaction on any early return rolls it back.
        let mut tx = self.pool.begin().await?;

        for update in &commit.stock_updates {
            let result = sqlx::query(
                r#"
                UPDATE books
                SET stock_quantity = $1, version = version + 1
                WHERE id = $2 AND version = $3
                "#,
            )
            .bind(i64::from(update.new_stock))
            .bind(update.book_id.as_i64())
            .bind(update.expected_version)
            .execute(&mut *tx)
            .await
            .map_err(map_commit_error)?;

            if result.rows_affected() != 1 {
                tracing::debug!(book_id = %update.book_id, "stock row changed since cart was read");
                return Err(StoreError::conflict(format!(
                    "book {} is no longer at version {}",
                    update.book_id, update.expected_version
                )));
            }
        }

        let order_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (user_id, status, total_amount_cents, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(commit.user_id.as_i64())
        .bind(commit.order.status.as_str())
        .bind(commit.order.total_amount.cents())
        .bind(commit.order.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_commit_error)?;

        for item in &commit.order.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, book_id, quantity, unit_price_cents)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(order_id)
            .bind(item.book_id.as_i64())
            .bind(i64::from(item.quantity))
            .bind(item.unit_price.cents())
            .execute(&mut *tx)
            .await
            .map_err(map_commit_error)?;
        }

        for consumed in &commit.consumed_cart {
            let result = sqlx::query(
                "DELETE FROM cart_items WHERE user_id = $1 AND book_id = $2 AND quantity = $3",
            )
            .bind(commit.user_id.as_i64())
            .bind(consumed.book_id.as_i64())
            .bind(i64::from(consumed.quantity))
            .execute(&mut *tx)
            .await
            .map_err(map_commit_error)?;

            if result.rows_affected() != 1 {
                return Err(StoreError::conflict(format!(
                    "cart row for book {} changed since it was read",
                    consumed.book_id
                )));
            }
        }

        tx.commit().await.map_err(map_commit_error)?;
        Ok(OrderId::new(order_id))
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        let rows = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.as_i64())
            .fetch_all(&self.pool)
            .await?;

        Ok(self.with_items(rows).await?.into_iter().next())
    }

    async fn list_orders_for_user(&self, user_id: UserId) -> Result<Vec<OrderRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY id ASC"
        ))
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        self.with_items(rows).await
    }

    async fn list_orders(&self) -> Result<Vec<OrderRecord>> {
        let rows = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await?;

        self.with_items(rows).await
    }

    async fn update_order_status(&self, order_id: OrderId, status: OrderStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE orders SET status = $1 WHERE id = $2")
            .bind(status.as_str())
            .bind(order_id.as_i64())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

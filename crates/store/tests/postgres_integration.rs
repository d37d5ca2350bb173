//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency and run
//! serially because each one truncates the tables. Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration
//! ```

use std::sync::Arc;

use chrono::Utc;
use serial_test::serial;
use sqlx::PgPool;
use store::{
    BookId, BookstoreStore, CartLine, CheckoutCommit, ConsumedCartItem, Money, NewBook, NewOrder,
    NewOrderItem, OrderId, OrderStatus, PostgresStore, StockUpdate, StoreError, UserId,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_bookstore_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let store = PostgresStore::connect(&info.connection_string, 5)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE order_items, orders, cart_items, books RESTART IDENTITY")
        .execute(store.pool())
        .await
        .unwrap();

    store
}

async fn seed_book(store: &PostgresStore, title: &str, price_cents: i64, stock: u32) -> BookId {
    store
        .insert_book(NewBook::new(title, Money::from_cents(price_cents), stock))
        .await
        .unwrap()
}

fn commit_for(user_id: UserId, lines: &[CartLine]) -> CheckoutCommit {
    CheckoutCommit {
        user_id,
        stock_updates: lines
            .iter()
            .map(|line| StockUpdate {
                book_id: line.book_id,
                expected_version: line.book_version,
                new_stock: line.stock_quantity - line.quantity,
            })
            .collect(),
        order: NewOrder {
            status: OrderStatus::Pending,
            total_amount: lines.iter().map(|l| l.price.multiply(l.quantity)).sum(),
            created_at: Utc::now(),
            items: lines
                .iter()
                .map(|line| NewOrderItem {
                    book_id: line.book_id,
                    quantity: line.quantity,
                    unit_price: line.price,
                })
                .collect(),
        },
        consumed_cart: lines
            .iter()
            .map(|line| ConsumedCartItem {
                book_id: line.book_id,
                quantity: line.quantity,
            })
            .collect(),
    }
}

#[tokio::test]
#[serial]
async fn insert_and_get_book() {
    let store = get_test_store().await;
    let book_id = seed_book(&store, "Dune", 1000, 5).await;

    let book = store.get_book(book_id).await.unwrap().unwrap();
    assert_eq!(book.title, "Dune");
    assert_eq!(book.price.cents(), 1000);
    assert_eq!(book.stock_quantity, 5);
    assert_eq!(book.version, 1);

    assert!(store.get_book(BookId::new(999)).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
async fn load_cart_joins_books_in_book_order() {
    let store = get_test_store().await;
    let user_id = UserId::new(1);
    let a = seed_book(&store, "A", 1000, 5).await;
    let b = seed_book(&store, "B", 500, 1).await;

    store.set_cart_item(user_id, b, 1).await.unwrap();
    store.set_cart_item(user_id, a, 2).await.unwrap();

    let lines = store.load_cart(user_id).await.unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].book_id, a);
    assert_eq!(lines[0].title, "A");
    assert_eq!(lines[0].quantity, 2);
    assert_eq!(lines[1].book_id, b);
    assert_eq!(lines[1].stock_quantity, 1);
}

#[tokio::test]
#[serial]
async fn set_cart_item_for_unknown_book_fails() {
    let store = get_test_store().await;
    let result = store.set_cart_item(UserId::new(1), BookId::new(42), 1).await;
    assert!(matches!(result, Err(StoreError::BookNotFound(id)) if id == BookId::new(42)));
}

#[tokio::test]
#[serial]
async fn commit_checkout_applies_all_writes() {
    let store = get_test_store().await;
    let user_id = UserId::new(1);
    let a = seed_book(&store, "A", 1000, 5).await;
    let b = seed_book(&store, "B", 500, 1).await;
    store.set_cart_item(user_id, a, 2).await.unwrap();
    store.set_cart_item(user_id, b, 1).await.unwrap();

    let lines = store.load_cart(user_id).await.unwrap();
    let order_id = store.commit_checkout(commit_for(user_id, &lines)).await.unwrap();

    assert_eq!(store.get_book(a).await.unwrap().unwrap().stock_quantity, 3);
    assert_eq!(store.get_book(b).await.unwrap().unwrap().stock_quantity, 0);
    assert!(store.cart_items(user_id).await.unwrap().is_empty());

    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.user_id, user_id);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount.cents(), 2500);
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.items[0].title.as_deref(), Some("A"));
}

#[tokio::test]
#[serial]
async fn stale_version_rolls_back_entire_commit() {
    let store = get_test_store().await;
    let user_id = UserId::new(1);
    let a = seed_book(&store, "A", 1000, 5).await;
    let b = seed_book(&store, "B", 500, 3).await;
    store.set_cart_item(user_id, a, 1).await.unwrap();
    store.set_cart_item(user_id, b, 1).await.unwrap();
    let lines = store.load_cart(user_id).await.unwrap();

    // Book B changes after the read; book A's update must not survive.
    store.update_book_price(b, Money::from_cents(600)).await.unwrap();

    let result = store.commit_checkout(commit_for(user_id, &lines)).await;
    assert!(matches!(result, Err(StoreError::ConcurrencyConflict { .. })));

    let book_a = store.get_book(a).await.unwrap().unwrap();
    assert_eq!(book_a.stock_quantity, 5);
    assert_eq!(book_a.version, 1);
    assert_eq!(store.cart_items(user_id).await.unwrap().len(), 2);
    assert!(store.list_orders().await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn changed_cart_row_rolls_back_entire_commit() {
    let store = get_test_store().await;
    let user_id = UserId::new(1);
    let book = seed_book(&store, "Dune", 1000, 5).await;
    store.set_cart_item(user_id, book, 1).await.unwrap();
    let lines = store.load_cart(user_id).await.unwrap();

    // The stock update still matches; only the cart row delete can notice.
    store.set_cart_item(user_id, book, 3).await.unwrap();

    let result = store.commit_checkout(commit_for(user_id, &lines)).await;
    assert!(matches!(result, Err(StoreError::ConcurrencyConflict { .. })));

    let stored = store.get_book(book).await.unwrap().unwrap();
    assert_eq!(stored.stock_quantity, 5);
    assert_eq!(stored.version, 1);
    assert!(store.list_orders().await.unwrap().is_empty());
    let cart = store.cart_items(user_id).await.unwrap();
    assert_eq!(cart.len(), 1);
    assert_eq!(cart[0].quantity, 3);
}

#[tokio::test]
#[serial]
async fn negative_price_is_rejected_before_the_database() {
    let store = get_test_store().await;

    let inserted = store
        .insert_book(NewBook::new("Refund", Money::from_cents(-1), 1))
        .await;
    assert!(matches!(inserted, Err(StoreError::InvalidBook(_))));

    let book = seed_book(&store, "Dune", 1000, 1).await;
    let updated = store.update_book_price(book, Money::from_cents(-500)).await;
    assert!(matches!(updated, Err(StoreError::InvalidBook(_))));
    assert_eq!(store.get_book(book).await.unwrap().unwrap().price.cents(), 1000);
}

#[tokio::test]
#[serial]
async fn concurrent_commits_for_last_unit_let_one_win() {
    let store = get_test_store().await;
    let book = seed_book(&store, "Last Copy", 1500, 1).await;
    let alice = UserId::new(1);
    let bob = UserId::new(2);
    store.set_cart_item(alice, book, 1).await.unwrap();
    store.set_cart_item(bob, book, 1).await.unwrap();

    let alice_commit = commit_for(alice, &store.load_cart(alice).await.unwrap());
    let bob_commit = commit_for(bob, &store.load_cart(bob).await.unwrap());

    let s1 = store.clone();
    let s2 = store.clone();
    let (r1, r2) = tokio::join!(
        tokio::spawn(async move { s1.commit_checkout(alice_commit).await }),
        tokio::spawn(async move { s2.commit_checkout(bob_commit).await }),
    );
    let results = [r1.unwrap(), r2.unwrap()];

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(StoreError::ConcurrencyConflict { .. })))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(conflicts, 1);
    assert_eq!(store.get_book(book).await.unwrap().unwrap().stock_quantity, 0);
    assert_eq!(store.list_orders().await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn list_orders_filters_by_user() {
    let store = get_test_store().await;
    let book = seed_book(&store, "A", 1000, 10).await;
    for user in [1, 2, 1] {
        let user_id = UserId::new(user);
        store.set_cart_item(user_id, book, 1).await.unwrap();
        let lines = store.load_cart(user_id).await.unwrap();
        store.commit_checkout(commit_for(user_id, &lines)).await.unwrap();
    }

    let mine = store.list_orders_for_user(UserId::new(1)).await.unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine[0].id < mine[1].id);
    assert_eq!(store.list_orders().await.unwrap().len(), 3);
}

#[tokio::test]
#[serial]
async fn update_order_status_persists() {
    let store = get_test_store().await;
    let user_id = UserId::new(1);
    let book = seed_book(&store, "A", 1000, 10).await;
    store.set_cart_item(user_id, book, 1).await.unwrap();
    let lines = store.load_cart(user_id).await.unwrap();
    let order_id = store.commit_checkout(commit_for(user_id, &lines)).await.unwrap();

    assert!(
        store
            .update_order_status(order_id, OrderStatus::Delivered)
            .await
            .unwrap()
    );
    let order = store.get_order(order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Delivered);

    assert!(
        !store
            .update_order_status(OrderId::new(999), OrderStatus::Shipped)
            .await
            .unwrap()
    );
}

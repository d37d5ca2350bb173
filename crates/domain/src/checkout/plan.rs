//! Stock reservation and order building.

use chrono::{DateTime, Utc};
use common::{Money, OrderStatus};
use store::{CheckoutCommit, ConsumedCartItem, NewOrder, NewOrderItem, StockUpdate};

use super::CartSnapshot;
use crate::error::CheckoutError;

/// Turns a cart snapshot into the writes of one checkout.
///
/// Every line is checked against the stock read in the same snapshot before
/// anything is planned, so a single short line rejects the whole cart.
/// Taking a line down to exactly zero stock is allowed. Unit prices are the
/// book prices of the snapshot and the order total is computed from the
/// planned lines, never re-read from storage. A total that does not fit in
/// `Money` rejects the cart with `AmountOverflow`.
pub fn plan_checkout(
    snapshot: &CartSnapshot,
    created_at: DateTime<Utc>,
) -> Result<CheckoutCommit, CheckoutError> {
    if snapshot.is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    if let Some(short) = snapshot
        .lines()
        .iter()
        .find(|line| line.stock_quantity < line.quantity)
    {
        return Err(CheckoutError::InsufficientStock {
            book_id: short.book_id,
            title: short.title.clone(),
            requested: short.quantity,
            available: short.stock_quantity,
        });
    }

    let lines = snapshot.lines();

    let stock_updates = lines
        .iter()
        .map(|line| StockUpdate {
            book_id: line.book_id,
            expected_version: line.book_version,
            new_stock: line.stock_quantity - line.quantity,
        })
        .collect();

    let items: Vec<NewOrderItem> = lines
        .iter()
        .map(|line| NewOrderItem {
            book_id: line.book_id,
            quantity: line.quantity,
            unit_price: line.price,
        })
        .collect();

    let consumed_cart = lines
        .iter()
        .map(|line| ConsumedCartItem {
            book_id: line.book_id,
            quantity: line.quantity,
        })
        .collect();

    let total_amount = items
        .iter()
        .try_fold(Money::zero(), |total, item| {
            item.unit_price
                .checked_multiply(item.quantity)
                .and_then(|line_total| total.checked_add(line_total))
        })
        .ok_or(CheckoutError::AmountOverflow)?;

    Ok(CheckoutCommit {
        user_id: snapshot.user_id(),
        stock_updates,
        order: NewOrder {
            status: OrderStatus::Pending,
            total_amount,
            created_at,
            items,
        },
        consumed_cart,
    })
}

#[cfg(test)]
mod tests {
    use common::{BookId, UserId};
    use store::{CartLine, validate_commit};

    use super::*;

    fn line(book: i64, title: &str, price_cents: i64, stock: u32, quantity: u32) -> CartLine {
        CartLine {
            book_id: BookId::new(book),
            quantity,
            title: title.to_string(),
            price: Money::from_cents(price_cents),
            stock_quantity: stock,
            book_version: 7,
        }
    }

    fn snapshot(lines: Vec<CartLine>) -> CartSnapshot {
        CartSnapshot::from_lines(UserId::new(1), lines)
    }

    #[test]
    fn empty_cart_is_rejected() {
        let result = plan_checkout(&snapshot(vec![]), Utc::now());
        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    }

    #[test]
    fn plans_stock_order_and_cart_writes() {
        let cart = snapshot(vec![
            line(1, "A", 1000, 5, 2),
            line(2, "B", 500, 1, 1),
        ]);

        let commit = plan_checkout(&cart, Utc::now()).unwrap();

        assert_eq!(commit.user_id, UserId::new(1));
        assert_eq!(commit.order.status, OrderStatus::Pending);
        assert_eq!(commit.order.total_amount, Money::from_cents(2500));
        assert_eq!(commit.stock_updates[0].new_stock, 3);
        assert_eq!(commit.stock_updates[1].new_stock, 0);
        assert_eq!(commit.stock_updates[0].expected_version, 7);
        assert_eq!(commit.order.items[1].unit_price, Money::from_cents(500));
        assert_eq!(commit.consumed_cart.len(), 2);
        assert!(validate_commit(&commit).is_ok());
    }

    #[test]
    fn quantity_equal_to_stock_is_allowed() {
        let commit = plan_checkout(&snapshot(vec![line(1, "A", 100, 3, 3)]), Utc::now()).unwrap();
        assert_eq!(commit.stock_updates[0].new_stock, 0);
    }

    #[test]
    fn one_short_line_rejects_whole_cart() {
        let cart = snapshot(vec![
            line(1, "Plenty", 1000, 50, 1),
            line(2, "Rare Folio", 9000, 1, 2),
        ]);

        let err = plan_checkout(&cart, Utc::now()).unwrap_err();
        match err {
            CheckoutError::InsufficientStock {
                book_id,
                title,
                requested,
                available,
            } => {
                assert_eq!(book_id, BookId::new(2));
                assert_eq!(title, "Rare Folio");
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
    }

    #[test]
    fn total_overflow_is_rejected() {
        let cart = snapshot(vec![line(1, "Vault", 3_000_000_000, 4_000_000_000, 4_000_000_000)]);
        let result = plan_checkout(&cart, Utc::now());
        assert!(matches!(result, Err(CheckoutError::AmountOverflow)));
    }

    #[test]
    fn overflow_across_lines_is_rejected() {
        let cart = snapshot(vec![
            line(1, "A", i64::MAX / 2, 1, 1),
            line(2, "B", i64::MAX / 2, 1, 1),
            line(3, "C", i64::MAX / 2, 1, 1),
        ]);
        let result = plan_checkout(&cart, Utc::now());
        assert!(matches!(result, Err(CheckoutError::AmountOverflow)));
    }

    #[test]
    fn insufficient_stock_message_names_the_book() {
        let err = plan_checkout(&snapshot(vec![line(1, "Dune", 100, 0, 1)]), Utc::now())
            .unwrap_err();
        assert_eq!(err.to_string(), "Insufficient stock for Dune");
    }
}

//! Checkout service providing the operations exposed to callers.

use chrono::Utc;
use common::{OrderId, UserId};
use store::BookstoreStore;

use crate::checkout::{CartSnapshot, RetryPolicy, plan_checkout};
use crate::error::CheckoutError;
use crate::order::{OrderView, parse_status};

/// Service for checking out carts and managing orders.
///
/// Holds no locks of its own: isolation between concurrent checkouts comes
/// from the store's conditional commit, and a lost race re-runs the whole
/// checkout from a fresh cart snapshot, at most `RetryPolicy::max_attempts`
/// times.
pub struct CheckoutService<S: BookstoreStore> {
    store: S,
    retry: RetryPolicy,
}

impl<S: BookstoreStore> CheckoutService<S> {
    /// Creates a new checkout service with the default retry policy.
    pub fn new(store: S) -> Self {
        Self::with_retry_policy(store, RetryPolicy::default())
    }

    pub fn with_retry_policy(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Converts the user's cart into a `Pending` order.
    ///
    /// On success every book's stock has dropped by the ordered quantity and
    /// the cart is empty. On any error nothing has changed.
    #[tracing::instrument(skip(self))]
    pub async fn checkout(&self, user_id: UserId) -> Result<OrderView, CheckoutError> {
        metrics::counter!("checkout_attempts_total").increment(1);
        let start = std::time::Instant::now();

        let result = self.checkout_with_retry(user_id).await;

        metrics::histogram!("checkout_duration_seconds").record(start.elapsed().as_secs_f64());
        match &result {
            Ok(order) => {
                metrics::counter!("checkout_success_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    total = %order.total_amount,
                    lines = order.items.len(),
                    "order placed"
                );
            }
            Err(err) => {
                metrics::counter!("checkout_failures_total", "reason" => err.kind()).increment(1);
                tracing::info!(error = %err, "checkout rejected");
            }
        }

        result
    }

    async fn checkout_with_retry(&self, user_id: UserId) -> Result<OrderView, CheckoutError> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let snapshot = CartSnapshot::load(&self.store, user_id).await?;
            let commit = plan_checkout(&snapshot, Utc::now())?;

            match self.store.commit_checkout(commit).await {
                Ok(order_id) => {
                    return self
                        .get_order(order_id)
                        .await?
                        .ok_or(CheckoutError::NotFound(order_id));
                }
                Err(err) if err.is_conflict() => {
                    metrics::counter!("checkout_conflicts_total").increment(1);
                    tracing::warn!(attempt, error = %err, "checkout commit conflicted");

                    if attempt >= self.retry.max_attempts {
                        return Err(CheckoutError::Transient { attempts: attempt });
                    }
                    tokio::time::sleep(self.retry.delay_after(attempt)).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Loads and projects a single order.
    ///
    /// Returns None if the order doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<OrderView>, CheckoutError> {
        Ok(self.store.get_order(order_id).await?.map(OrderView::from))
    }

    /// Lists the orders placed by `user_id`, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, user_id: UserId) -> Result<Vec<OrderView>, CheckoutError> {
        let orders = self.store.list_orders_for_user(user_id).await?;
        Ok(orders.into_iter().map(OrderView::from).collect())
    }

    /// Lists every order, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_all_orders(&self) -> Result<Vec<OrderView>, CheckoutError> {
        let orders = self.store.list_orders().await?;
        Ok(orders.into_iter().map(OrderView::from).collect())
    }

    /// Sets an order's status and returns the re-projected order.
    ///
    /// The status name is validated before the order is looked up. Returns
    /// None if the order doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn set_order_status(
        &self,
        order_id: OrderId,
        status: &str,
    ) -> Result<Option<OrderView>, CheckoutError> {
        let status = parse_status(status)?;

        if !self.store.update_order_status(order_id, status).await? {
            return Ok(None);
        }

        metrics::counter!("order_status_updates_total", "status" => status.as_str()).increment(1);
        tracing::info!(%order_id, %status, "order status updated");

        self.get_order(order_id).await
    }
}

//! HTTP API server with observability for the bookstore checkout service.
//!
//! Provides REST endpoints for checkout and order management, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod identity;
pub mod response;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::{CheckoutService, RetryPolicy};
use metrics_exporter_prometheus::PrometheusHandle;
use store::BookstoreStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: BookstoreStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let orders = Router::new()
        .route("/orders/checkout", post(routes::orders::checkout::<S>))
        .route("/orders/mine", get(routes::orders::mine::<S>))
        .route("/orders", get(routes::orders::list_all::<S>))
        .route("/orders/{id}/status", put(routes::orders::update_status::<S>));

    Router::new()
        .route("/health", get(routes::health::check))
        .nest("/api", orders)
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over `store`.
pub fn create_state<S: BookstoreStore>(store: S, retry: RetryPolicy) -> Arc<AppState<S>> {
    Arc::new(AppState {
        checkout_service: CheckoutService::with_retry_policy(store, retry),
    })
}

//! Checkout and order management endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use domain::{CheckoutService, OrderId, OrderView};
use serde::Deserialize;
use store::BookstoreStore;

use crate::error::ApiError;
use crate::identity::{AdminUser, AuthenticatedUser};
use crate::response::ApiResponse;

/// Shared application state accessible from all handlers.
pub struct AppState<S: BookstoreStore> {
    pub checkout_service: CheckoutService<S>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -- Handlers --

/// POST /api/orders/checkout: turn the caller's cart into an order.
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn checkout<S: BookstoreStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<OrderView>>, ApiError> {
    let order = state.checkout_service.checkout(user.user_id).await?;
    Ok(Json(ApiResponse::ok_with_message(order, "Order placed")))
}

/// GET /api/orders/mine: the caller's own orders.
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn mine<S: BookstoreStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<OrderView>>>, ApiError> {
    let orders = state.checkout_service.list_orders(user.user_id).await?;
    Ok(Json(ApiResponse::ok(orders)))
}

/// GET /api/orders: every order (admin only).
#[tracing::instrument(skip(state, _admin))]
pub async fn list_all<S: BookstoreStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminUser,
) -> Result<Json<ApiResponse<Vec<OrderView>>>, ApiError> {
    let orders = state.checkout_service.list_all_orders().await?;
    Ok(Json(ApiResponse::ok(orders)))
}

/// PUT /api/orders/{id}/status: set an order's status (admin only).
#[tracing::instrument(skip(state, _admin, id, payload))]
pub async fn update_status<S: BookstoreStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminUser,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<OrderView>>, ApiError> {
    let Path(id) = id?;
    let Json(req) = payload?;
    let order_id = OrderId::new(id);

    let order = state
        .checkout_service
        .set_order_status(order_id, &req.status)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found.".to_string()))?;

    Ok(Json(ApiResponse::ok_with_message(order, "Order status updated")))
}

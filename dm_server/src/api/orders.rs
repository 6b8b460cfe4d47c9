//! Order endpoints for buyers and sellers.
//!
//! The caller is always the authenticated user: orders are placed with the
//! caller as buyer, and only participants can read or move an order.
//!
//! # Examples
//!
//! Place a rental:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/orders \
//!   -H "Authorization: Bearer TOKEN" \
//!   -H "Content-Type: application/json" \
//!   -d '{"item_id": 2, "order_type": "rent"}'
//! ```
//!
//! Confirm delivery:
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/orders/1/status \
//!   -H "Authorization: Bearer TOKEN" \
//!   -H "Content-Type: application/json" \
//!   -d '{"target_status": "delivered"}'
//! ```

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use dress_market::UserId;
use dress_market::identity::UserIdentity;
use dress_market::inventory::ItemId;
use dress_market::orders::{Order, OrderFilter, OrderId, OrderStatus, OrderType, OrderWithItem};
use serde::Deserialize;

use super::{AppState, error::ApiError};
use crate::metrics;

/// Longest dispute reason accepted
const MAX_REASON_LEN: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub item_id: ItemId,
    pub order_type: OrderType,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub target_status: OrderStatus,
}

#[derive(Debug, Default, Deserialize)]
pub struct DisputeRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub user_id: Option<UserId>,
    pub status: Option<OrderStatus>,
}

/// Place an order with the caller as buyer.
///
/// # Errors
///
/// - `402 Payment Required`: wallet cannot cover the escrow
/// - `409 Conflict`: item is not available
/// - `422 Unprocessable Entity`: caller is the item's seller
pub async fn create_order(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let order = state
        .orders
        .create_order(identity.user_id, request.item_id, request.order_type)
        .await?;

    metrics::orders_created_total(order.order_type.as_str());
    metrics::escrow_locked_amount(order.escrow_amount);
    tracing::info!(
        order_id = order.id,
        buyer_id = order.buyer_id,
        item_id = order.item_id,
        escrow = order.escrow_amount,
        "Order created"
    );

    Ok((StatusCode::CREATED, Json(order)))
}

/// Move an order to `target_status`.
///
/// Only the buyer confirms delivery and closes. Disputed orders are closed
/// through the support resolve endpoint.
///
/// # Errors
///
/// - `403 Forbidden`: caller is not buyer or seller, or may not take this step
/// - `409 Conflict`: order is closed or the transition is not allowed
pub async fn advance_status(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(order_id): Path<OrderId>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .orders
        .advance_status(order_id, request.target_status, Some(identity.user_id))
        .await?;

    metrics::order_transitions_total(order.status.as_str());
    Ok(Json(order))
}

/// Freeze an order's escrow pending a support decision
pub async fn raise_dispute(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(order_id): Path<OrderId>,
    Json(request): Json<DisputeRequest>,
) -> Result<Json<Order>, ApiError> {
    let reason = request
        .reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    if reason.as_ref().is_some_and(|r| r.len() > MAX_REASON_LEN) {
        return Err(ApiError::validation(format!(
            "Dispute reason must be at most {MAX_REASON_LEN} bytes"
        )));
    }

    let order = state
        .orders
        .raise_dispute(order_id, reason, Some(identity.user_id))
        .await?;

    metrics::order_transitions_total(order.status.as_str());
    tracing::info!(order_id, user_id = identity.user_id, "Dispute raised");
    Ok(Json(order))
}

/// List the caller's orders joined with their items, newest first.
///
/// `user_id` may be given but must be the caller's own ID.
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Query(query): Query<OrderQuery>,
) -> Result<Json<Vec<OrderWithItem>>, ApiError> {
    let user_id = query.user_id.unwrap_or(identity.user_id);
    if user_id != identity.user_id {
        return Err(ApiError::forbidden("You can only list your own orders"));
    }

    let orders = state
        .orders
        .list_orders(OrderFilter {
            participant: Some(user_id),
            status: query.status,
        })
        .await?;
    Ok(Json(orders))
}

/// Get one order the caller takes part in
pub async fn get_order(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Path(order_id): Path<OrderId>,
) -> Result<Json<Order>, ApiError> {
    let order = state.orders.get_order(order_id).await?;
    if !order.involves(identity.user_id) {
        return Err(ApiError::new(
            "not_participant",
            "You are not part of this order",
        ));
    }
    Ok(Json(order))
}

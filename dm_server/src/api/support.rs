//! Support-only endpoints, guarded by the shared support key.
//!
//! ```bash
//! curl -X POST http://localhost:8080/api/v1/support/orders/3/resolve \
//!   -H "x-support-key: KEY" \
//!   -H "Content-Type: application/json" \
//!   -d '{"refund_to_buyer": 4000, "release_to_seller": 2000}'
//! ```

use axum::{
    Json,
    extract::{Path, State},
};
use dress_market::accounts::UserId;
use dress_market::ledger::{Amount, Balances};
use dress_market::orders::{DisputeResolution, Order, OrderId, RentalTickReport};
use serde::Deserialize;

use super::{AppState, error::ApiError};
use crate::{logging, metrics};

#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    pub amount: Amount,
    pub description: Option<String>,
}

/// Settle a disputed order with the given split
pub async fn resolve_dispute(
    State(state): State<AppState>,
    Path(order_id): Path<OrderId>,
    Json(split): Json<DisputeResolution>,
) -> Result<Json<Order>, ApiError> {
    let order = state.orders.resolve_dispute(order_id, split).await?;

    metrics::disputes_resolved_total();
    tracing::info!(
        order_id,
        refund = split.refund_to_buyer,
        release = split.release_to_seller,
        "Dispute resolved by support"
    );
    Ok(Json(order))
}

/// Credit external funds to a user's wallet
pub async fn top_up(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
    Json(request): Json<TopUpRequest>,
) -> Result<Json<Balances>, ApiError> {
    let balances = state
        .ledger
        .top_up(user_id, request.amount, request.description)
        .await?;

    metrics::top_ups_total();
    Ok(Json(balances))
}

/// Run one rental tick now
pub async fn tick_rentals(
    State(state): State<AppState>,
) -> Result<Json<RentalTickReport>, ApiError> {
    let report = state.orders.tick_rentals().await?;

    metrics::rentals_overdue(report.overdue.len());
    logging::log_rental_tick(&report);
    Ok(Json(report))
}

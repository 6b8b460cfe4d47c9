//! Account endpoints.

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
};
use dress_market::accounts::{User, UserId, UserProfile};
use dress_market::identity::UserIdentity;
use dress_market::ledger::{DEFAULT_ENTRY_LIMIT, LedgerEntry};
use serde::Deserialize;

use super::{AppState, error::ApiError};

/// Upper bound on `limit` for ledger listings
const MAX_ENTRY_LIMIT: i64 = 500;

#[derive(Debug, Default, Deserialize)]
pub struct LedgerQuery {
    pub limit: Option<i64>,
}

/// The caller's own account, balances included
pub async fn me(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.accounts.get_user(identity.user_id).await?))
}

/// Public profile of any user
pub async fn profile(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(state.accounts.profile(user_id).await?))
}

/// The caller's most recent ledger entries, newest first
pub async fn my_ledger(
    State(state): State<AppState>,
    Extension(identity): Extension<UserIdentity>,
    Query(query): Query<LedgerQuery>,
) -> Result<Json<Vec<LedgerEntry>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ENTRY_LIMIT)
        .clamp(1, MAX_ENTRY_LIMIT);
    Ok(Json(state.ledger.entries(identity.user_id, limit).await?))
}

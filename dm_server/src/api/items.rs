//! Public listing endpoints.
//!
//! ```bash
//! curl 'http://localhost:8080/api/v1/items?status=live'
//! ```

use axum::{
    Json,
    extract::{Path, Query, State},
};
use dress_market::UserId;
use dress_market::inventory::{Item, ItemFilter, ItemId, ItemStatus};
use serde::Deserialize;

use super::{AppState, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct ItemQuery {
    pub status: Option<ItemStatus>,
    pub seller_id: Option<UserId>,
}

/// List items, optionally filtered by status and seller
pub async fn list_items(
    State(state): State<AppState>,
    Query(query): Query<ItemQuery>,
) -> Result<Json<Vec<Item>>, ApiError> {
    let items = state
        .inventory
        .list_items(ItemFilter {
            status: query.status,
            seller_id: query.seller_id,
        })
        .await?;
    Ok(Json(items))
}

/// Get one item
pub async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<ItemId>,
) -> Result<Json<Item>, ApiError> {
    Ok(Json(state.inventory.get_item(item_id).await?))
}

//! Inventory error types.

use thiserror::Error;

use super::models::{ItemId, ItemStatus};
use crate::accounts::UserId;
use crate::db::StoreError;
use crate::orders::OrderType;

/// Inventory errors
#[derive(Debug, Error)]
pub enum InventoryError {
    /// Storage error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Item not found
    #[error("Item not found: {0}")]
    ItemNotFound(ItemId),

    /// Item already has an open order
    #[error("Item {item_id} is not available (status: {status})")]
    ItemNotAvailable { item_id: ItemId, status: ItemStatus },

    /// Listing does not offer this kind of order
    #[error("Item {item_id} is not offered for {order_type}")]
    NotOffered { item_id: ItemId, order_type: OrderType },

    /// Seller account does not exist
    #[error("Seller not found: {0}")]
    SellerNotFound(UserId),

    /// Malformed listing
    #[error("Validation error: {0}")]
    Validation(String),

    /// Item has an open order
    #[error("Item {0} has an open order")]
    HasOpenOrders(ItemId),

    /// Item is referenced by closed orders kept for history
    #[error("Item {0} has order history and cannot be deleted")]
    HasOrderHistory(ItemId),
}

impl InventoryError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            InventoryError::Store(_) => "internal_error",
            InventoryError::ItemNotFound(_) | InventoryError::SellerNotFound(_) => "not_found",
            InventoryError::ItemNotAvailable { .. } | InventoryError::NotOffered { .. } => {
                "item_not_available"
            }
            InventoryError::Validation(_) => "validation_error",
            InventoryError::HasOpenOrders(_) | InventoryError::HasOrderHistory(_) => "conflict",
        }
    }

    /// Get a client-safe error message that doesn't leak internal details
    pub fn client_message(&self) -> String {
        match self {
            InventoryError::Store(_) => "Internal server error".to_string(),
            InventoryError::ItemNotFound(_) => "Item not found".to_string(),
            InventoryError::SellerNotFound(_) => "Seller not found".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for inventory operations
pub type InventoryResult<T> = Result<T, InventoryError>;

//! Inventory manager implementation.

use log::info;
use std::sync::Arc;

use super::{
    errors::{InventoryError, InventoryResult},
    models::{Item, ItemFilter, ItemId, NewItem},
};
use crate::accounts::UserId;
use crate::db::{DEFAULT_TRANSACTION_TIMEOUT, MarketStore, with_timeout};

/// Inventory manager
#[derive(Clone)]
pub struct InventoryManager {
    store: Arc<dyn MarketStore>,
}

impl InventoryManager {
    /// Create a new inventory manager
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    /// Publish a live listing
    ///
    /// # Errors
    ///
    /// * `InventoryError::Validation` - prices do not match the transaction type
    /// * `InventoryError::SellerNotFound` - seller account does not exist
    pub async fn list_item(&self, item: NewItem) -> InventoryResult<Item> {
        item.validate().map_err(InventoryError::Validation)?;

        if self.store.find_user(item.seller_id).await?.is_none() {
            return Err(InventoryError::SellerNotFound(item.seller_id));
        }

        let created = self.store.insert_item(&item).await?;
        info!(
            "Listed item {} ({}) for seller {}",
            created.id, created.transaction_type, created.seller_id
        );
        Ok(created)
    }

    /// Get item by ID
    pub async fn get_item(&self, item_id: ItemId) -> InventoryResult<Item> {
        self.store
            .find_item(item_id)
            .await?
            .ok_or(InventoryError::ItemNotFound(item_id))
    }

    /// List items matching `filter`
    pub async fn list_items(&self, filter: ItemFilter) -> InventoryResult<Vec<Item>> {
        Ok(self.store.list_items(&filter).await?)
    }

    /// All listings of one seller, whatever their status
    pub async fn items_for_seller(&self, seller_id: UserId) -> InventoryResult<Vec<Item>> {
        self.list_items(ItemFilter {
            status: None,
            seller_id: Some(seller_id),
        })
        .await
    }

    /// Remove a listing that no order has ever referenced
    ///
    /// # Errors
    ///
    /// * `InventoryError::HasOpenOrders` - an open order holds the item
    /// * `InventoryError::HasOrderHistory` - closed orders reference the item
    pub async fn delete_item(&self, item_id: ItemId) -> InventoryResult<()> {
        with_timeout(DEFAULT_TRANSACTION_TIMEOUT, async {
            let mut tx = self.store.begin().await?;
            tx.lock_item(item_id)
                .await?
                .ok_or(InventoryError::ItemNotFound(item_id))?;

            let counts = tx.count_orders_for_item(item_id).await?;
            if counts.open > 0 {
                return Err(InventoryError::HasOpenOrders(item_id));
            }
            if counts.total > 0 {
                return Err(InventoryError::HasOrderHistory(item_id));
            }

            tx.delete_item(item_id).await?;
            tx.commit().await?;
            Ok::<_, InventoryError>(())
        })
        .await?;

        info!("Deleted item {}", item_id);
        Ok(())
    }
}

//! Item availability transitions.
//!
//! An item is `Live` exactly when no open order references it. These rules
//! run on an item snapshot held under a row lock, inside the same transaction
//! as the order write that justifies them.

use log::warn;

use super::{
    errors::{InventoryError, InventoryResult},
    models::{Item, ItemStatus},
};
use crate::orders::OrderType;

impl Item {
    /// Take a live item off the market for a new order
    ///
    /// Sales move to `Processing`, rentals to `Rented`.
    ///
    /// # Errors
    ///
    /// * `InventoryError::ItemNotAvailable` - item is not `Live`
    /// * `InventoryError::NotOffered` - listing does not offer `order_type`
    pub fn reserve(&mut self, order_type: OrderType) -> InventoryResult<()> {
        if self.status != ItemStatus::Live {
            return Err(InventoryError::ItemNotAvailable {
                item_id: self.id,
                status: self.status,
            });
        }
        if !self.transaction_type.offers(order_type) {
            return Err(InventoryError::NotOffered {
                item_id: self.id,
                order_type,
            });
        }

        self.status = match order_type {
            OrderType::Buy => ItemStatus::Processing,
            OrderType::Rent => ItemStatus::Rented,
        };
        Ok(())
    }

    /// Put the item back on the market once its order is closed
    ///
    /// Releasing an item that is already live changes nothing; it points at
    /// a caller bug and is logged.
    pub fn release(&mut self) {
        if self.status == ItemStatus::Live {
            warn!("Release requested for item {} which is already live", self.id);
            return;
        }
        self.status = ItemStatus::Live;
    }

    /// Flag a rented item whose rental ran out
    ///
    /// Only `Rented` items move; anything else is left alone and `false` is
    /// returned.
    pub fn mark_awaiting_pickup(&mut self) -> bool {
        if self.status != ItemStatus::Rented {
            return false;
        }
        self.status = ItemStatus::AwaitingPickup;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::TransactionType;
    use chrono::Utc;

    fn item(transaction_type: TransactionType) -> Item {
        Item {
            id: 7,
            title: "Acne Studios Leather Jacket".to_string(),
            category: "Jackets".to_string(),
            brand: "Acne Studios".to_string(),
            size: "M".to_string(),
            condition: "A".to_string(),
            transaction_type,
            sale_price: Some(28_500),
            rent_price: Some(1500),
            deposit: Some(8000),
            image: "/assets/items/acne-jacket.png".to_string(),
            status: ItemStatus::Live,
            verified: true,
            seller_id: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_reserve_for_sale_and_rent() {
        let mut sold = item(TransactionType::Both);
        sold.reserve(OrderType::Buy).unwrap();
        assert_eq!(sold.status, ItemStatus::Processing);

        let mut rented = item(TransactionType::Both);
        rented.reserve(OrderType::Rent).unwrap();
        assert_eq!(rented.status, ItemStatus::Rented);
    }

    #[test]
    fn test_reserve_twice_fails() {
        let mut jacket = item(TransactionType::Both);
        jacket.reserve(OrderType::Buy).unwrap();
        let err = jacket.reserve(OrderType::Rent).unwrap_err();
        assert!(matches!(
            err,
            InventoryError::ItemNotAvailable {
                status: ItemStatus::Processing,
                ..
            }
        ));
        assert_eq!(jacket.status, ItemStatus::Processing);
    }

    #[test]
    fn test_reserve_rejects_unoffered_type() {
        let mut rent_only = item(TransactionType::Rent);
        assert!(matches!(
            rent_only.reserve(OrderType::Buy),
            Err(InventoryError::NotOffered { .. })
        ));
        assert_eq!(rent_only.status, ItemStatus::Live);
    }

    #[test]
    fn test_release_is_noop_on_live_item() {
        let mut jacket = item(TransactionType::Sale);
        jacket.release();
        assert_eq!(jacket.status, ItemStatus::Live);

        jacket.reserve(OrderType::Buy).unwrap();
        jacket.release();
        assert_eq!(jacket.status, ItemStatus::Live);
    }

    #[test]
    fn test_mark_awaiting_pickup_only_from_rented() {
        let mut jacket = item(TransactionType::Both);
        assert!(!jacket.mark_awaiting_pickup());

        jacket.reserve(OrderType::Rent).unwrap();
        assert!(jacket.mark_awaiting_pickup());
        assert_eq!(jacket.status, ItemStatus::AwaitingPickup);
    }

    #[test]
    fn test_escrow_for() {
        let jacket = item(TransactionType::Both);
        assert_eq!(jacket.escrow_for(OrderType::Buy).unwrap(), 28_500);
        assert_eq!(jacket.escrow_for(OrderType::Rent).unwrap(), 9500);

        let mut no_deposit = item(TransactionType::Rent);
        no_deposit.deposit = None;
        assert_eq!(no_deposit.escrow_for(OrderType::Rent).unwrap(), 1500);
        assert!(no_deposit.escrow_for(OrderType::Buy).is_err());
    }
}

//! Item listing models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::errors::{InventoryError, InventoryResult};
use crate::accounts::UserId;
use crate::ledger::Amount;
use crate::orders::OrderType;

/// Item ID type
pub type ItemId = i64;

/// Availability of a listed item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Listed with no open order
    Live,
    /// Sold, order in progress
    Processing,
    /// Out on rental
    Rented,
    /// Rental ran out and the item waits to be collected
    AwaitingPickup,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Live => "live",
            ItemStatus::Processing => "processing",
            ItemStatus::Rented => "rented",
            ItemStatus::AwaitingPickup => "awaiting_pickup",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(ItemStatus::Live),
            "processing" => Ok(ItemStatus::Processing),
            "rented" => Ok(ItemStatus::Rented),
            "awaiting_pickup" => Ok(ItemStatus::AwaitingPickup),
            other => Err(format!("unknown item status {other:?}")),
        }
    }
}

/// How a listing may be acquired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Sale,
    Rent,
    Both,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Sale => "sale",
            TransactionType::Rent => "rent",
            TransactionType::Both => "both",
        }
    }

    /// Whether an order of `order_type` can be placed on this listing
    pub fn offers(&self, order_type: OrderType) -> bool {
        matches!(
            (self, order_type),
            (TransactionType::Both, _)
                | (TransactionType::Sale, OrderType::Buy)
                | (TransactionType::Rent, OrderType::Rent)
        )
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sale" => Ok(TransactionType::Sale),
            "rent" => Ok(TransactionType::Rent),
            "both" => Ok(TransactionType::Both),
            other => Err(format!("unknown transaction type {other:?}")),
        }
    }
}

/// Listed item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub category: String,
    pub brand: String,
    pub size: String,
    pub condition: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub sale_price: Option<Amount>,
    pub rent_price: Option<Amount>,
    pub deposit: Option<Amount>,
    pub image: String,
    pub status: ItemStatus,
    pub verified: bool,
    pub seller_id: UserId,
    pub created_at: DateTime<Utc>,
}

impl Item {
    /// Funds a buyer must lock to place an order of `order_type`: the sale
    /// price for a purchase, rent plus deposit for a rental.
    pub fn escrow_for(&self, order_type: OrderType) -> InventoryResult<Amount> {
        if !self.transaction_type.offers(order_type) {
            return Err(InventoryError::NotOffered {
                item_id: self.id,
                order_type,
            });
        }

        let amount = match order_type {
            OrderType::Buy => self.sale_price,
            OrderType::Rent => self
                .rent_price
                .and_then(|rent| rent.checked_add(self.deposit.unwrap_or(0))),
        };

        match amount {
            Some(amount) if amount > 0 => Ok(amount),
            _ => Err(InventoryError::NotOffered {
                item_id: self.id,
                order_type,
            }),
        }
    }
}

/// Listing about to be created
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItem {
    pub title: String,
    pub category: String,
    pub brand: String,
    pub size: String,
    pub condition: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub sale_price: Option<Amount>,
    pub rent_price: Option<Amount>,
    pub deposit: Option<Amount>,
    pub image: String,
    pub verified: bool,
    pub seller_id: UserId,
}

impl NewItem {
    /// Check that the prices match the transaction type
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }

        let needs_sale = matches!(
            self.transaction_type,
            TransactionType::Sale | TransactionType::Both
        );
        let needs_rent = matches!(
            self.transaction_type,
            TransactionType::Rent | TransactionType::Both
        );

        match self.sale_price {
            Some(price) if price <= 0 => return Err(format!("sale price must be positive, got {price}")),
            None if needs_sale => return Err(format!("{} listing needs a sale price", self.transaction_type)),
            _ => {}
        }
        match self.rent_price {
            Some(price) if price <= 0 => return Err(format!("rent price must be positive, got {price}")),
            None if needs_rent => return Err(format!("{} listing needs a rent price", self.transaction_type)),
            _ => {}
        }
        if let Some(deposit) = self.deposit
            && deposit < 0
        {
            return Err(format!("deposit must not be negative, got {deposit}"));
        }
        Ok(())
    }
}

/// Optional status filter for listing queries
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ItemFilter {
    pub status: Option<ItemStatus>,
    pub seller_id: Option<UserId>,
}

impl ItemFilter {
    pub fn matches(&self, item: &Item) -> bool {
        self.status.is_none_or(|status| item.status == status)
            && self.seller_id.is_none_or(|seller| item.seller_id == seller)
    }
}

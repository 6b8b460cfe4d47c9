//! Order data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::accounts::UserId;
use crate::inventory::{Item, ItemId};
use crate::ledger::Amount;

/// Order ID type
pub type OrderId = i64;

/// Purchase or rental
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Buy,
    Rent,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Buy => "buy",
            OrderType::Rent => "rent",
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(OrderType::Buy),
            "rent" => Ok(OrderType::Rent),
            other => Err(format!("unknown order type {other:?}")),
        }
    }
}

/// Order status. Transition rules live in [`super::state_machine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    ActiveRental,
    Shipped,
    Delivered,
    Dispute,
    Closed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::ActiveRental,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Dispute,
        OrderStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::ActiveRental => "active_rental",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Dispute => "dispute",
            OrderStatus::Closed => "closed",
        }
    }

    /// Every status except `Closed` counts as open
    pub fn is_open(&self) -> bool {
        !matches!(self, OrderStatus::Closed)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active_rental" => Ok(OrderStatus::ActiveRental),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "dispute" => Ok(OrderStatus::Dispute),
            "closed" => Ok(OrderStatus::Closed),
            other => Err(format!("unknown order status {other:?}")),
        }
    }
}

/// Next action a participant is expected to take
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionRequired {
    /// Buyer confirms the shipped item arrived
    ConfirmReceipt,
    /// Renter returns the item before the rental ends
    ReturnItem,
    /// Rental period is over and the item has not come back
    ReturnOverdue,
    /// Waiting on a support decision
    DisputePending,
}

impl ActionRequired {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionRequired::ConfirmReceipt => "confirm_receipt",
            ActionRequired::ReturnItem => "return_item",
            ActionRequired::ReturnOverdue => "return_overdue",
            ActionRequired::DisputePending => "dispute_pending",
        }
    }
}

impl std::fmt::Display for ActionRequired {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionRequired {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirm_receipt" => Ok(ActionRequired::ConfirmReceipt),
            "return_item" => Ok(ActionRequired::ReturnItem),
            "return_overdue" => Ok(ActionRequired::ReturnOverdue),
            "dispute_pending" => Ok(ActionRequired::DisputePending),
            other => Err(format!("unknown action {other:?}")),
        }
    }
}

/// Order model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub item_id: ItemId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub escrow_amount: Amount,
    pub deposit_locked: Option<Amount>,
    pub days_remaining: Option<i32>,
    pub action_required: Option<ActionRequired>,
    pub dispute_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn involves(&self, user_id: UserId) -> bool {
        self.buyer_id == user_id || self.seller_id == user_id
    }
}

/// Order about to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub item_id: ItemId,
    pub buyer_id: UserId,
    pub seller_id: UserId,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub escrow_amount: Amount,
    pub deposit_locked: Option<Amount>,
    pub days_remaining: Option<i32>,
    pub action_required: Option<ActionRequired>,
}

/// Support decision that settles a disputed order. The two parts must add
/// up to the order's escrow amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeResolution {
    pub refund_to_buyer: Amount,
    pub release_to_seller: Amount,
}

/// Filter for order listings
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OrderFilter {
    /// Only orders where this user is buyer or seller
    pub participant: Option<UserId>,
    pub status: Option<OrderStatus>,
}

impl OrderFilter {
    pub fn for_participant(user_id: UserId) -> Self {
        Self {
            participant: Some(user_id),
            status: None,
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.participant.is_none_or(|user| order.involves(user))
            && self.status.is_none_or(|status| order.status == status)
    }
}

/// Order joined with the item it references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderWithItem {
    #[serde(flatten)]
    pub order: Order,
    pub item: Item,
}

/// What a rental tick changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalTickReport {
    /// Rentals whose remaining days went down
    pub decremented: Vec<OrderId>,
    /// Rentals that ran out on this tick
    pub overdue: Vec<OrderId>,
}

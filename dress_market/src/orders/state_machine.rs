//! Order lifecycle state machine.
//!
//! ```text
//! Created ──rent──> ActiveRental ─┐
//!    └────buy────> Shipped ───────┴─> Delivered ──> Closed
//!
//! any open status ──> Dispute ──> Closed
//! ```
//!
//! `Created` is never stored: an order comes into existence already in
//! `ActiveRental` or `Shipped`. All transition checks go through
//! [`check_transition`]; the functions here mutate snapshots taken under a
//! row lock and report which balance and item effects the caller must apply
//! in the same transaction.

use chrono::Utc;

use super::{
    errors::{OrderError, OrderResult},
    models::{ActionRequired, NewOrder, Order, OrderId, OrderStatus, OrderType},
};
use crate::accounts::{User, UserId};
use crate::inventory::{InventoryError, Item, ItemStatus};
use crate::ledger::Amount;

impl OrderStatus {
    /// Statuses reachable in one step
    pub fn allowed_targets(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::ActiveRental | OrderStatus::Shipped => {
                &[OrderStatus::Delivered, OrderStatus::Dispute]
            }
            OrderStatus::Delivered => &[OrderStatus::Closed, OrderStatus::Dispute],
            OrderStatus::Dispute => &[OrderStatus::Closed],
            OrderStatus::Closed => &[],
        }
    }

    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        self.allowed_targets().contains(&to)
    }
}

/// Validate `from -> to` for order `order_id`
///
/// # Errors
///
/// * `OrderError::OrderAlreadyClosed` - `from` is `Closed`
/// * `OrderError::InvalidTransition` - the step is not in the lifecycle
pub fn check_transition(order_id: OrderId, from: OrderStatus, to: OrderStatus) -> OrderResult<()> {
    if from == OrderStatus::Closed {
        return Err(OrderError::OrderAlreadyClosed(order_id));
    }
    if !from.can_transition_to(to) {
        return Err(OrderError::InvalidTransition { from, to });
    }
    Ok(())
}

/// Effects of a transition outside the order row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Nothing beyond the order row
    None,
    /// Pay the whole escrow to the seller and put the item back on the market
    ReleaseToSeller(Amount),
    /// Put the item back on the market; funds were settled separately
    FreeItem,
}

/// Outcome of one rental tick on one order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RentalTick {
    Unchanged,
    Decremented,
    BecameOverdue,
}

/// Open an order: check the parties and the item, lock the escrow on the
/// buyer snapshot and reserve the item snapshot.
///
/// On error neither snapshot is modified.
///
/// # Errors
///
/// * `InventoryError::ItemNotAvailable` - item is not live
/// * `OrderError::InvalidParty` - buyer is the item's seller
/// * `InventoryError::NotOffered` - listing does not offer `order_type`
/// * `LedgerError::InsufficientFunds` - buyer wallet cannot cover the escrow
pub fn open_order(
    buyer: &mut User,
    item: &mut Item,
    order_type: OrderType,
    rental_days: i32,
) -> OrderResult<NewOrder> {
    if item.status != ItemStatus::Live {
        return Err(InventoryError::ItemNotAvailable {
            item_id: item.id,
            status: item.status,
        }
        .into());
    }
    if buyer.id == item.seller_id {
        return Err(OrderError::InvalidParty { user_id: buyer.id });
    }

    let escrow_amount = item.escrow_for(order_type)?;

    let mut reserved = item.clone();
    reserved.reserve(order_type)?;
    buyer.balances.move_to_escrow(escrow_amount)?;
    *item = reserved;

    let new_order = match order_type {
        OrderType::Buy => NewOrder {
            item_id: item.id,
            buyer_id: buyer.id,
            seller_id: item.seller_id,
            order_type,
            status: OrderStatus::Shipped,
            escrow_amount,
            deposit_locked: None,
            days_remaining: None,
            action_required: Some(ActionRequired::ConfirmReceipt),
        },
        OrderType::Rent => NewOrder {
            item_id: item.id,
            buyer_id: buyer.id,
            seller_id: item.seller_id,
            order_type,
            status: OrderStatus::ActiveRental,
            escrow_amount,
            deposit_locked: Some(item.deposit.unwrap_or(0)),
            days_remaining: Some(rental_days),
            action_required: Some(ActionRequired::ReturnItem),
        },
    };
    Ok(new_order)
}

impl Order {
    /// Move the order to `to`, returning the settlement the caller owes
    ///
    /// On error the order is not modified.
    pub fn advance(&mut self, to: OrderStatus) -> OrderResult<Settlement> {
        let from = self.status;
        check_transition(self.id, from, to)?;

        let settlement = match (from, to) {
            (_, OrderStatus::Dispute) => {
                self.action_required = Some(ActionRequired::DisputePending);
                Settlement::None
            }
            (_, OrderStatus::Delivered) => {
                self.action_required = None;
                Settlement::None
            }
            (OrderStatus::Delivered, OrderStatus::Closed) => {
                self.action_required = None;
                Settlement::ReleaseToSeller(self.escrow_amount)
            }
            (OrderStatus::Dispute, OrderStatus::Closed) => {
                self.action_required = None;
                Settlement::FreeItem
            }
            _ => Settlement::None,
        };

        self.status = to;
        self.updated_at = Utc::now();
        Ok(settlement)
    }

    /// Check that participant `user_id` may move the order to `to`
    ///
    /// Either party may raise a dispute. Confirming delivery and closing
    /// belong to the buyer. A disputed order is closed only by support,
    /// which settles the escrow in the same step.
    ///
    /// # Errors
    ///
    /// * `OrderError::StepNotPermitted` - the step belongs to someone else
    pub fn authorize_step(&self, user_id: UserId, to: OrderStatus) -> OrderResult<()> {
        let permitted = match (self.status, to) {
            (_, OrderStatus::Dispute) => true,
            (OrderStatus::Dispute, _) => false,
            _ => user_id == self.buyer_id,
        };
        if !permitted {
            return Err(OrderError::StepNotPermitted {
                order_id: self.id,
                user_id,
                to,
            });
        }
        Ok(())
    }

    /// Flag the order as disputed. Escrow stays where it is.
    pub fn raise_dispute(&mut self, reason: Option<String>) -> OrderResult<()> {
        self.advance(OrderStatus::Dispute)?;
        self.dispute_reason = reason;
        Ok(())
    }

    /// Count down one day of an active rental
    ///
    /// Hitting zero flags the return as overdue; the status stays
    /// `ActiveRental`.
    pub fn tick_rental(&mut self) -> RentalTick {
        if self.status != OrderStatus::ActiveRental {
            return RentalTick::Unchanged;
        }
        match self.days_remaining {
            Some(days) if days > 0 => {
                let left = days - 1;
                self.days_remaining = Some(left);
                self.updated_at = Utc::now();
                if left == 0 {
                    self.action_required = Some(ActionRequired::ReturnOverdue);
                    RentalTick::BecameOverdue
                } else {
                    RentalTick::Decremented
                }
            }
            _ => RentalTick::Unchanged,
        }
    }
}

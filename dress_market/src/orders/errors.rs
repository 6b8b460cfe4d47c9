//! Order error types.

use thiserror::Error;

use super::models::{OrderId, OrderStatus};
use crate::accounts::UserId;
use crate::db::StoreError;
use crate::inventory::InventoryError;
use crate::ledger::LedgerError;

/// Order errors
#[derive(Debug, Error)]
pub enum OrderError {
    /// Storage error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Balance movement failed
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Item reservation failed
    #[error(transparent)]
    Inventory(#[from] InventoryError),

    /// Order not found
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Buyer tried to order their own listing
    #[error("User {user_id} cannot order their own item")]
    InvalidParty { user_id: UserId },

    /// Order is closed; no further transitions
    #[error("Order {0} is already closed")]
    OrderAlreadyClosed(OrderId),

    /// Transition not allowed by the lifecycle
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Caller is neither buyer nor seller
    #[error("User {user_id} is not a participant of order {order_id}")]
    NotParticipant { order_id: OrderId, user_id: UserId },

    /// Participant may not take this step
    #[error("User {user_id} may not move order {order_id} to {to}")]
    StepNotPermitted {
        order_id: OrderId,
        user_id: UserId,
        to: OrderStatus,
    },

    /// Malformed request
    #[error("Validation error: {0}")]
    Validation(String),
}

impl OrderError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::Store(_) => "internal_error",
            OrderError::Ledger(e) => e.code(),
            OrderError::Inventory(e) => e.code(),
            OrderError::OrderNotFound(_) => "not_found",
            OrderError::InvalidParty { .. } => "invalid_party",
            OrderError::OrderAlreadyClosed(_) => "order_already_closed",
            OrderError::InvalidTransition { .. } => "invalid_transition",
            OrderError::NotParticipant { .. } => "not_participant",
            OrderError::StepNotPermitted { .. } => "forbidden",
            OrderError::Validation(_) => "validation_error",
        }
    }

    /// True for broken invariants (escrow underflow, unreadable rows)
    pub fn is_invariant_violation(&self) -> bool {
        match self {
            OrderError::Ledger(e) => e.is_invariant_violation(),
            OrderError::Store(StoreError::CorruptRow { .. }) => true,
            _ => false,
        }
    }

    /// Get a client-safe error message that doesn't leak internal details
    pub fn client_message(&self) -> String {
        match self {
            OrderError::Store(_) => "Internal server error".to_string(),
            OrderError::Ledger(e) => e.client_message(),
            OrderError::Inventory(e) => e.client_message(),
            OrderError::OrderNotFound(_) => "Order not found".to_string(),
            OrderError::InvalidParty { .. } => "You cannot order your own item".to_string(),
            OrderError::NotParticipant { .. } => "You are not part of this order".to_string(),
            OrderError::StepNotPermitted { to, .. } => {
                format!("You cannot move this order to {to}")
            }
            _ => self.to_string(),
        }
    }
}

/// Result type for order operations
pub type OrderResult<T> = Result<T, OrderError>;

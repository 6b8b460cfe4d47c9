//! Ledger error types.

use thiserror::Error;

use super::models::Amount;
use crate::accounts::UserId;
use crate::db::StoreError;

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Storage error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Account not found
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// Wallet cannot cover the debit
    #[error("Insufficient wallet balance: available {available}, required {required}")]
    InsufficientFunds { available: Amount, required: Amount },

    /// Escrow holds less than the amount being released. Only a corrupted
    /// order or balance can produce this.
    #[error("Escrow underflow: held {held}, required {required}")]
    EscrowUnderflow { held: Amount, required: Amount },

    /// Balance would exceed the representable range
    #[error("Balance overflow")]
    BalanceOverflow,

    /// Amount must be strictly positive
    #[error("Invalid amount: {0}")]
    InvalidAmount(Amount),

    /// Funds cannot move between a user and themselves
    #[error("Payer and payee must differ")]
    SameParty,
}

impl LedgerError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::UserNotFound(_) => "not_found",
            LedgerError::InsufficientFunds { .. } => "insufficient_funds",
            LedgerError::InvalidAmount(_) => "validation_error",
            LedgerError::SameParty => "invalid_party",
            LedgerError::Store(_) | LedgerError::EscrowUnderflow { .. } | LedgerError::BalanceOverflow => {
                "internal_error"
            }
        }
    }

    /// True for broken invariants, which are logged as critical and never
    /// surfaced in detail
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            LedgerError::EscrowUnderflow { .. } | LedgerError::BalanceOverflow
        )
    }

    /// Get a client-safe error message that doesn't leak internal details
    pub fn client_message(&self) -> String {
        match self {
            LedgerError::Store(_)
            | LedgerError::EscrowUnderflow { .. }
            | LedgerError::BalanceOverflow => "Internal server error".to_string(),
            LedgerError::UserNotFound(_) => "User not found".to_string(),
            LedgerError::InsufficientFunds { .. } => "Insufficient wallet balance".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

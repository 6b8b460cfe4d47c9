//! Account error types.

use thiserror::Error;

use super::models::UserId;
use crate::db::StoreError;

/// Account errors
#[derive(Debug, Error)]
pub enum AccountError {
    /// Storage error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// User not found
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    /// Email already registered
    #[error("Email already registered")]
    EmailTaken,

    /// Malformed profile
    #[error("Validation error: {0}")]
    Validation(String),

    /// User is party to orders that are still open
    #[error("User {user_id} has {open} open order(s)")]
    HasOpenOrders { user_id: UserId, open: usize },

    /// User is referenced by closed orders kept for history
    #[error("User {0} has order history and cannot be deleted")]
    HasOrderHistory(UserId),
}

impl AccountError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AccountError::Store(_) => "internal_error",
            AccountError::UserNotFound(_) => "not_found",
            AccountError::EmailTaken => "conflict",
            AccountError::Validation(_) => "validation_error",
            AccountError::HasOpenOrders { .. } | AccountError::HasOrderHistory(_) => "conflict",
        }
    }

    /// Get a client-safe error message that doesn't leak internal details
    pub fn client_message(&self) -> String {
        match self {
            AccountError::Store(_) => "Internal server error".to_string(),
            AccountError::UserNotFound(_) => "User not found".to_string(),
            AccountError::HasOpenOrders { .. } => "User has open orders".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Result type for account operations
pub type AccountResult<T> = Result<T, AccountError>;

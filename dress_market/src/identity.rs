//! Identity boundary.
//!
//! Login, password hashing and token issuance belong to an external identity
//! service. The marketplace only needs to turn a bearer token into the user
//! it belongs to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::accounts::UserId;

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: UserId,
    pub email: Option<String>,
}

/// Token verification errors
#[derive(Debug, Error)]
pub enum AuthError {
    /// No bearer token on the request
    #[error("Missing bearer token")]
    MissingToken,

    /// Token is malformed or its signature does not verify
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token has expired
    #[error("Token expired")]
    Expired,
}

impl AuthError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::Expired => "token_expired",
        }
    }

    /// Get a client-safe error message that doesn't leak internal details
    pub fn client_message(&self) -> String {
        match self {
            AuthError::InvalidToken(_) => "Invalid token".to_string(),
            _ => self.to_string(),
        }
    }
}

/// Resolves bearer tokens to users
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify `token` and return the user it was issued to
    async fn current_user(&self, token: &str) -> Result<UserIdentity, AuthError>;
}

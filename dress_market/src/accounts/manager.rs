//! Account manager implementation.

use log::info;
use std::sync::Arc;

use super::{
    errors::{AccountError, AccountResult},
    models::{NewUser, User, UserId, UserProfile},
};
use crate::db::{DEFAULT_TRANSACTION_TIMEOUT, MarketStore, StoreError, with_timeout};
use crate::inventory::{ItemFilter, ItemStatus};

/// Account manager
#[derive(Clone)]
pub struct AccountManager {
    store: Arc<dyn MarketStore>,
}

impl AccountManager {
    /// Create a new account manager
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    /// Create a user with empty balances
    ///
    /// # Errors
    ///
    /// * `AccountError::Validation` - malformed email, name or trust score
    /// * `AccountError::EmailTaken` - email already registered
    pub async fn create_user(&self, user: NewUser) -> AccountResult<User> {
        user.validate().map_err(AccountError::Validation)?;

        let created = self.store.insert_user(&user).await.map_err(|e| match e {
            StoreError::Conflict(_) => AccountError::EmailTaken,
            other => AccountError::Store(other),
        })?;

        info!("Created user {} ({})", created.id, created.email);
        Ok(created)
    }

    /// Get user by ID
    pub async fn get_user(&self, user_id: UserId) -> AccountResult<User> {
        self.store
            .find_user(user_id)
            .await?
            .ok_or(AccountError::UserNotFound(user_id))
    }

    /// Public profile of a user
    pub async fn profile(&self, user_id: UserId) -> AccountResult<UserProfile> {
        let user = self.get_user(user_id).await?;
        let live = self
            .store
            .list_items(&ItemFilter {
                status: Some(ItemStatus::Live),
                seller_id: Some(user_id),
            })
            .await?;

        Ok(UserProfile {
            id: user.id,
            name: user.name,
            trust_score: user.trust_score,
            avatar: user.avatar,
            live_listings: live.len(),
            member_since: user.created_at,
        })
    }

    /// Delete a user with no order history
    ///
    /// Their listings and ledger entries go with them.
    ///
    /// # Errors
    ///
    /// * `AccountError::HasOpenOrders` - user is party to an open order
    /// * `AccountError::HasOrderHistory` - user is party to a closed order
    pub async fn delete_user(&self, user_id: UserId) -> AccountResult<()> {
        with_timeout(DEFAULT_TRANSACTION_TIMEOUT, async {
            let mut tx = self.store.begin().await?;
            tx.lock_user(user_id)
                .await?
                .ok_or(AccountError::UserNotFound(user_id))?;

            let counts = tx.count_orders_for_user(user_id).await?;
            if counts.open > 0 {
                return Err(AccountError::HasOpenOrders {
                    user_id,
                    open: counts.open,
                });
            }
            if counts.total > 0 {
                return Err(AccountError::HasOrderHistory(user_id));
            }

            tx.delete_user(user_id).await?;
            tx.commit().await?;
            Ok::<_, AccountError>(())
        })
        .await?;

        info!("Deleted user {}", user_id);
        Ok(())
    }
}

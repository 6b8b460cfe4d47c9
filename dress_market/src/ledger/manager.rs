//! Ledger manager: wallet and escrow movements, each with its audit entry.

use log::{error, info};
use std::sync::Arc;

use super::{
    balances::{ensure_positive, refund_escrow_to_buyer, release_escrow_to_seller},
    errors::{LedgerError, LedgerResult},
    models::{Amount, Balances, EntryType, LedgerEntry, NewLedgerEntry},
};
use crate::accounts::{User, UserId};
use crate::db::{DEFAULT_TRANSACTION_TIMEOUT, MarketStore, MarketTx, StoreResult, with_timeout};
use crate::orders::OrderId;

/// Default number of entries returned by [`LedgerManager::entries`]
pub const DEFAULT_ENTRY_LIMIT: i64 = 50;

/// Lock a user row, failing if it does not exist
pub(crate) async fn lock_account(tx: &mut dyn MarketTx, user_id: UserId) -> LedgerResult<User> {
    tx.lock_user(user_id)
        .await?
        .ok_or(LedgerError::UserNotFound(user_id))
}

/// Lock two user rows in ascending ID order, returned as `(first, second)`
pub(crate) async fn lock_pair(
    tx: &mut dyn MarketTx,
    first: UserId,
    second: UserId,
) -> LedgerResult<(User, User)> {
    if first == second {
        return Err(LedgerError::SameParty);
    }
    if first < second {
        let a = lock_account(tx, first).await?;
        let b = lock_account(tx, second).await?;
        Ok((a, b))
    } else {
        let b = lock_account(tx, second).await?;
        let a = lock_account(tx, first).await?;
        Ok((a, b))
    }
}

/// Persist a user's new balances together with the entry explaining them
pub(crate) async fn post(
    tx: &mut dyn MarketTx,
    user: &User,
    entry_type: EntryType,
    amount: Amount,
    order_id: Option<OrderId>,
    description: Option<String>,
) -> StoreResult<LedgerEntry> {
    tx.update_balances(user).await?;
    tx.insert_entry(&NewLedgerEntry {
        user_id: user.id,
        order_id,
        entry_type,
        amount,
        wallet_after: user.balances.wallet,
        escrow_after: user.balances.escrow,
        description,
    })
    .await
}

/// Log broken balance invariants before the error propagates
pub(crate) fn report(err: LedgerError) -> LedgerError {
    if err.is_invariant_violation() {
        error!("Ledger invariant violated: {err}");
    }
    err
}

/// Ledger manager
#[derive(Clone)]
pub struct LedgerManager {
    store: Arc<dyn MarketStore>,
}

impl LedgerManager {
    /// Create a new ledger manager
    pub fn new(store: Arc<dyn MarketStore>) -> Self {
        Self { store }
    }

    /// Current wallet and escrow balances of a user
    pub async fn balances(&self, user_id: UserId) -> LedgerResult<Balances> {
        self.store
            .find_user(user_id)
            .await?
            .map(|user| user.balances)
            .ok_or(LedgerError::UserNotFound(user_id))
    }

    /// Most recent ledger entries of a user, newest first
    pub async fn entries(&self, user_id: UserId, limit: i64) -> LedgerResult<Vec<LedgerEntry>> {
        if self.store.find_user(user_id).await?.is_none() {
            return Err(LedgerError::UserNotFound(user_id));
        }
        Ok(self.store.ledger_entries(user_id, limit.max(0)).await?)
    }

    /// Credit a wallet from outside the marketplace
    ///
    /// This is the only operation that increases a user's total funds.
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - `amount` is not positive
    /// * `LedgerError::UserNotFound` - no such user
    pub async fn top_up(
        &self,
        user_id: UserId,
        amount: Amount,
        description: Option<String>,
    ) -> LedgerResult<Balances> {
        ensure_positive(amount)?;

        let balances = with_timeout(DEFAULT_TRANSACTION_TIMEOUT, async {
            let mut tx = self.store.begin().await?;
            let mut user = lock_account(tx.as_mut(), user_id).await?;
            user.balances.credit_wallet(amount).map_err(report)?;
            post(tx.as_mut(), &user, EntryType::TopUp, amount, None, description).await?;
            tx.commit().await?;
            Ok::<_, LedgerError>(user.balances)
        })
        .await?;

        info!("Topped up user {} by {}", user_id, amount);
        Ok(balances)
    }

    /// Move funds from a user's wallet into escrow
    ///
    /// # Errors
    ///
    /// * `LedgerError::InvalidAmount` - `amount` is not positive
    /// * `LedgerError::InsufficientFunds` - wallet cannot cover `amount`
    pub async fn move_to_escrow(
        &self,
        user_id: UserId,
        amount: Amount,
        order_id: Option<OrderId>,
    ) -> LedgerResult<Balances> {
        ensure_positive(amount)?;

        with_timeout(DEFAULT_TRANSACTION_TIMEOUT, async {
            let mut tx = self.store.begin().await?;
            let mut user = lock_account(tx.as_mut(), user_id).await?;
            user.balances.move_to_escrow(amount).map_err(report)?;
            post(tx.as_mut(), &user, EntryType::EscrowLock, amount, order_id, None).await?;
            tx.commit().await?;
            Ok::<_, LedgerError>(user.balances)
        })
        .await
    }

    /// Return escrowed funds to the buyer's wallet
    ///
    /// # Errors
    ///
    /// * `LedgerError::EscrowUnderflow` - escrow holds less than `amount`
    pub async fn refund_escrow_to_buyer(
        &self,
        buyer_id: UserId,
        amount: Amount,
        order_id: Option<OrderId>,
    ) -> LedgerResult<Balances> {
        ensure_positive(amount)?;

        with_timeout(DEFAULT_TRANSACTION_TIMEOUT, async {
            let mut tx = self.store.begin().await?;
            let mut buyer = lock_account(tx.as_mut(), buyer_id).await?;
            refund_escrow_to_buyer(&mut buyer.balances, amount).map_err(report)?;
            post(tx.as_mut(), &buyer, EntryType::Refund, amount, order_id, None).await?;
            tx.commit().await?;
            Ok::<_, LedgerError>(buyer.balances)
        })
        .await
    }

    /// Pay escrowed funds from the buyer to the seller's wallet
    ///
    /// Returns the new `(buyer, seller)` balances.
    ///
    /// # Errors
    ///
    /// * `LedgerError::SameParty` - buyer and seller are the same user
    /// * `LedgerError::EscrowUnderflow` - buyer escrow holds less than `amount`
    pub async fn release_escrow_to_seller(
        &self,
        buyer_id: UserId,
        seller_id: UserId,
        amount: Amount,
        order_id: Option<OrderId>,
    ) -> LedgerResult<(Balances, Balances)> {
        ensure_positive(amount)?;

        with_timeout(DEFAULT_TRANSACTION_TIMEOUT, async {
            let mut tx = self.store.begin().await?;
            let (mut buyer, mut seller) = lock_pair(tx.as_mut(), buyer_id, seller_id).await?;
            release_escrow_to_seller(&mut buyer.balances, &mut seller.balances, amount)
                .map_err(report)?;
            post(tx.as_mut(), &buyer, EntryType::EscrowRelease, amount, order_id, None).await?;
            post(tx.as_mut(), &seller, EntryType::Payout, amount, order_id, None).await?;
            tx.commit().await?;
            Ok::<_, LedgerError>((buyer.balances, seller.balances))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::NewUser;
    use crate::db::MemoryStore;

    async fn setup() -> (LedgerManager, UserId, UserId) {
        let store = Arc::new(MemoryStore::new());
        let buyer = store
            .insert_user(&NewUser::new("buyer@example.com", "Buyer"))
            .await
            .unwrap();
        let seller = store
            .insert_user(&NewUser::new("seller@example.com", "Seller"))
            .await
            .unwrap();
        (LedgerManager::new(store), buyer.id, seller.id)
    }

    #[tokio::test]
    async fn test_top_up_writes_entry() {
        let (ledger, buyer, _) = setup().await;
        let balances = ledger.top_up(buyer, 10_000, None).await.unwrap();
        assert_eq!(balances, Balances::new(10_000, 0));

        let entries = ledger.entries(buyer, DEFAULT_ENTRY_LIMIT).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_type, EntryType::TopUp);
        assert_eq!(entries[0].wallet_after, 10_000);
    }

    #[tokio::test]
    async fn test_move_then_refund_restores_balances() {
        let (ledger, buyer, _) = setup().await;
        ledger.top_up(buyer, 250, None).await.unwrap();

        ledger.move_to_escrow(buyer, 100, None).await.unwrap();
        assert_eq!(ledger.balances(buyer).await.unwrap(), Balances::new(150, 100));

        ledger.refund_escrow_to_buyer(buyer, 100, None).await.unwrap();
        assert_eq!(ledger.balances(buyer).await.unwrap(), Balances::new(250, 0));
    }

    #[tokio::test]
    async fn test_insufficient_funds_changes_nothing() {
        let (ledger, buyer, _) = setup().await;
        ledger.top_up(buyer, 5000, None).await.unwrap();

        let err = ledger.move_to_escrow(buyer, 6000, None).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(ledger.balances(buyer).await.unwrap(), Balances::new(5000, 0));
        assert_eq!(ledger.entries(buyer, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_release_pays_seller() {
        let (ledger, buyer, seller) = setup().await;
        ledger.top_up(buyer, 10_000, None).await.unwrap();
        ledger.move_to_escrow(buyer, 6000, None).await.unwrap();

        let (b, s) = ledger
            .release_escrow_to_seller(buyer, seller, 6000, None)
            .await
            .unwrap();
        assert_eq!(b, Balances::new(4000, 0));
        assert_eq!(s, Balances::new(6000, 0));
    }

    #[tokio::test]
    async fn test_release_underflow_is_rejected() {
        let (ledger, buyer, seller) = setup().await;
        let err = ledger
            .release_escrow_to_seller(buyer, seller, 1, None)
            .await
            .unwrap_err();
        assert!(err.is_invariant_violation());
        assert_eq!(ledger.balances(seller).await.unwrap(), Balances::default());
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let (ledger, buyer, _) = setup().await;
        assert!(matches!(
            ledger.top_up(buyer, 0, None).await,
            Err(LedgerError::InvalidAmount(0))
        ));
        assert!(matches!(
            ledger.release_escrow_to_seller(buyer, buyer, 10, None).await,
            Err(LedgerError::SameParty)
        ));
        assert!(matches!(
            ledger.top_up(999, 10, None).await,
            Err(LedgerError::UserNotFound(999))
        ));
    }
}

//! Order manager: runs each lifecycle step as one transaction.
//!
//! Rows are locked in a fixed order (orders, then items, then users in
//! ascending ID order) so concurrent steps on overlapping rows queue up
//! instead of deadlocking. Any error drops the transaction, which rolls back
//! every write made so far.

use log::{error, info, warn};
use std::sync::Arc;

use super::{
    config::MarketConfig,
    errors::{OrderError, OrderResult},
    models::{
        DisputeResolution, Order, OrderFilter, OrderId, OrderStatus, OrderType, OrderWithItem,
        RentalTickReport,
    },
    state_machine::{RentalTick, Settlement, check_transition, open_order},
};
use crate::accounts::UserId;
use crate::db::{MarketStore, MarketTx, StoreError, with_timeout};
use crate::inventory::{InventoryError, Item, ItemId};
use crate::ledger::{
    EntryType, ensure_positive,
    manager::{lock_account, lock_pair, post},
    refund_escrow_to_buyer, release_escrow_to_seller,
};

/// Log broken invariants before the error propagates
fn report(err: OrderError) -> OrderError {
    if err.is_invariant_violation() {
        error!("Order invariant violated: {err}");
    }
    err
}

/// Lock the item an existing order points at
async fn lock_order_item(tx: &mut dyn MarketTx, order: &Order) -> OrderResult<Item> {
    tx.lock_item(order.item_id).await?.ok_or_else(|| {
        StoreError::corrupt("orders", format!("order {} has no item", order.id)).into()
    })
}

/// Pay `amount` of the order's escrow to its seller
async fn settle_to_seller(tx: &mut dyn MarketTx, order: &Order, amount: i64) -> OrderResult<()> {
    let (mut buyer, mut seller) = lock_pair(tx, order.buyer_id, order.seller_id).await?;
    release_escrow_to_seller(&mut buyer.balances, &mut seller.balances, amount)?;
    post(tx, &buyer, EntryType::EscrowRelease, amount, Some(order.id), None).await?;
    post(tx, &seller, EntryType::Payout, amount, Some(order.id), None).await?;
    Ok(())
}

/// Return `amount` of the order's escrow to its buyer
async fn settle_to_buyer(tx: &mut dyn MarketTx, order: &Order, amount: i64) -> OrderResult<()> {
    let mut buyer = lock_account(tx, order.buyer_id).await?;
    refund_escrow_to_buyer(&mut buyer.balances, amount)?;
    post(tx, &buyer, EntryType::Refund, amount, Some(order.id), None).await?;
    Ok(())
}

/// Put the order's item back on the market
async fn free_item(tx: &mut dyn MarketTx, order: &Order) -> OrderResult<()> {
    let mut item = lock_order_item(tx, order).await?;
    item.release();
    tx.update_item_status(&item).await?;
    Ok(())
}

/// Order manager
#[derive(Clone)]
pub struct OrderManager {
    store: Arc<dyn MarketStore>,
    config: MarketConfig,
}

impl OrderManager {
    /// Create a new order manager
    pub fn new(store: Arc<dyn MarketStore>, config: MarketConfig) -> Self {
        Self { store, config }
    }

    /// Rental length and transaction deadline this manager runs with
    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// Place a purchase or rental
    ///
    /// Locks the escrow on the buyer, reserves the item and inserts the
    /// order in one transaction.
    ///
    /// # Errors
    ///
    /// * `InventoryError::ItemNotFound` - no such item
    /// * `InventoryError::ItemNotAvailable` - item is not live
    /// * `OrderError::InvalidParty` - buyer is the item's seller
    /// * `LedgerError::InsufficientFunds` - buyer wallet cannot cover the escrow
    pub async fn create_order(
        &self,
        buyer_id: UserId,
        item_id: ItemId,
        order_type: OrderType,
    ) -> OrderResult<Order> {
        let rental_days = self.config.rental_days;

        let order = with_timeout(self.config.transaction_timeout, async {
            let mut tx = self.store.begin().await?;

            let mut item = tx
                .lock_item(item_id)
                .await?
                .ok_or(InventoryError::ItemNotFound(item_id))?;
            let mut buyer = lock_account(tx.as_mut(), buyer_id).await?;

            let new_order = open_order(&mut buyer, &mut item, order_type, rental_days)?;

            tx.update_item_status(&item).await?;
            let order = tx.insert_order(&new_order).await.map_err(|e| match e {
                StoreError::Conflict(_) => OrderError::from(InventoryError::ItemNotAvailable {
                    item_id,
                    status: item.status,
                }),
                other => other.into(),
            })?;
            post(
                tx.as_mut(),
                &buyer,
                EntryType::EscrowLock,
                order.escrow_amount,
                Some(order.id),
                Some(format!("Escrow for {} of item {}", order_type, item_id)),
            )
            .await?;

            tx.commit().await?;
            Ok::<_, OrderError>(order)
        })
        .await
        .map_err(report)?;

        info!(
            "Created {} order {} on item {} for buyer {} (escrow {})",
            order.order_type, order.id, order.item_id, order.buyer_id, order.escrow_amount
        );
        Ok(order)
    }

    /// Move an order to `target`
    ///
    /// `Delivered -> Closed` pays the full escrow to the seller and frees
    /// the item. `Dispute -> Closed` only frees the item; any fund split must
    /// already have been applied. `* -> Dispute` is the same as
    /// [`raise_dispute`](Self::raise_dispute) without a reason.
    ///
    /// When `actor` is given it must be the buyer or the seller, and the
    /// step must be one that party may take (see [`Order::authorize_step`]).
    /// Without an actor any lifecycle step is allowed.
    ///
    /// # Errors
    ///
    /// * `OrderError::OrderNotFound` - no such order
    /// * `OrderError::NotParticipant` - `actor` is not part of the order
    /// * `OrderError::StepNotPermitted` - `actor` may not take this step
    /// * `OrderError::OrderAlreadyClosed` - the order is closed
    /// * `OrderError::InvalidTransition` - the step is not in the lifecycle
    pub async fn advance_status(
        &self,
        order_id: OrderId,
        target: OrderStatus,
        actor: Option<UserId>,
    ) -> OrderResult<Order> {
        if target == OrderStatus::Dispute {
            return self.raise_dispute(order_id, None, actor).await;
        }

        let order = with_timeout(self.config.transaction_timeout, async {
            let mut tx = self.store.begin().await?;
            let mut order = lock_participant_order(tx.as_mut(), order_id, actor).await?;
            if let Some(user_id) = actor {
                check_transition(order.id, order.status, target)?;
                order.authorize_step(user_id, target)?;
            }

            match order.advance(target)? {
                Settlement::None => {}
                Settlement::ReleaseToSeller(amount) => {
                    let mut item = lock_order_item(tx.as_mut(), &order).await?;
                    settle_to_seller(tx.as_mut(), &order, amount).await?;
                    item.release();
                    tx.update_item_status(&item).await?;
                }
                Settlement::FreeItem => free_item(tx.as_mut(), &order).await?,
            }

            tx.update_order(&order).await?;
            tx.commit().await?;
            Ok::<_, OrderError>(order)
        })
        .await
        .map_err(report)?;

        info!("Order {} moved to {}", order.id, order.status);
        Ok(order)
    }

    /// Flag an order as disputed. Escrow stays where it is.
    pub async fn raise_dispute(
        &self,
        order_id: OrderId,
        reason: Option<String>,
        actor: Option<UserId>,
    ) -> OrderResult<Order> {
        let order = with_timeout(self.config.transaction_timeout, async {
            let mut tx = self.store.begin().await?;
            let mut order = lock_participant_order(tx.as_mut(), order_id, actor).await?;
            order.raise_dispute(reason)?;
            tx.update_order(&order).await?;
            tx.commit().await?;
            Ok::<_, OrderError>(order)
        })
        .await
        .map_err(report)?;

        warn!(
            "Order {} disputed: {}",
            order.id,
            order.dispute_reason.as_deref().unwrap_or("no reason given")
        );
        Ok(order)
    }

    /// Apply a support decision to a disputed order and close it
    ///
    /// The two parts of `split` must be non-negative and add up to the
    /// order's escrow amount. Refund, payout, closing and freeing the item
    /// all commit together.
    ///
    /// # Errors
    ///
    /// * `OrderError::Validation` - split does not cover the escrow exactly
    /// * `OrderError::OrderAlreadyClosed` - the order is closed
    /// * `OrderError::InvalidTransition` - the order is not in dispute
    pub async fn resolve_dispute(
        &self,
        order_id: OrderId,
        split: DisputeResolution,
    ) -> OrderResult<Order> {
        if split.refund_to_buyer < 0 || split.release_to_seller < 0 {
            return Err(OrderError::Validation(
                "dispute split amounts must not be negative".to_string(),
            ));
        }

        let order = with_timeout(self.config.transaction_timeout, async {
            let mut tx = self.store.begin().await?;
            let mut order = tx
                .lock_order(order_id)
                .await?
                .ok_or(OrderError::OrderNotFound(order_id))?;

            match order.status {
                OrderStatus::Dispute => {}
                OrderStatus::Closed => return Err(OrderError::OrderAlreadyClosed(order_id)),
                from => {
                    return Err(OrderError::InvalidTransition {
                        from,
                        to: OrderStatus::Closed,
                    });
                }
            }

            let covered = split.refund_to_buyer.checked_add(split.release_to_seller);
            if covered != Some(order.escrow_amount) {
                return Err(OrderError::Validation(format!(
                    "split {} + {} does not match escrow {}",
                    split.refund_to_buyer, split.release_to_seller, order.escrow_amount
                )));
            }

            let mut item = lock_order_item(tx.as_mut(), &order).await?;
            if ensure_positive(split.refund_to_buyer).is_ok() {
                settle_to_buyer(tx.as_mut(), &order, split.refund_to_buyer).await?;
            }
            if ensure_positive(split.release_to_seller).is_ok() {
                settle_to_seller(tx.as_mut(), &order, split.release_to_seller).await?;
            }

            order.advance(OrderStatus::Closed)?;
            item.release();
            tx.update_item_status(&item).await?;
            tx.update_order(&order).await?;
            tx.commit().await?;
            Ok::<_, OrderError>(order)
        })
        .await
        .map_err(report)?;

        info!(
            "Resolved dispute on order {}: refund {}, release {}",
            order.id, split.refund_to_buyer, split.release_to_seller
        );
        Ok(order)
    }

    /// Count down one day on every active rental
    ///
    /// A rental reaching zero is flagged `ReturnOverdue` and its item moves
    /// to `AwaitingPickup`; the order status does not change.
    pub async fn tick_rentals(&self) -> OrderResult<RentalTickReport> {
        let report = with_timeout(self.config.transaction_timeout, async {
            let mut tx = self.store.begin().await?;
            let mut report = RentalTickReport::default();

            for mut order in tx.lock_active_rentals().await? {
                match order.tick_rental() {
                    RentalTick::Unchanged => continue,
                    RentalTick::Decremented => report.decremented.push(order.id),
                    RentalTick::BecameOverdue => {
                        let mut item = lock_order_item(tx.as_mut(), &order).await?;
                        if item.mark_awaiting_pickup() {
                            tx.update_item_status(&item).await?;
                        }
                        report.overdue.push(order.id);
                    }
                }
                tx.update_order(&order).await?;
            }

            tx.commit().await?;
            Ok::<_, OrderError>(report)
        })
        .await
        .map_err(report)?;

        if !report.overdue.is_empty() {
            warn!("Rentals overdue: {:?}", report.overdue);
        }
        Ok(report)
    }

    /// Get order by ID
    pub async fn get_order(&self, order_id: OrderId) -> OrderResult<Order> {
        self.store
            .find_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    /// List orders matching `filter`, each joined with its item
    pub async fn list_orders(&self, filter: OrderFilter) -> OrderResult<Vec<OrderWithItem>> {
        Ok(self.store.list_orders(&filter).await?)
    }

    /// Orders where `user_id` is buyer or seller, newest first
    pub async fn orders_for_user(&self, user_id: UserId) -> OrderResult<Vec<OrderWithItem>> {
        self.list_orders(OrderFilter::for_participant(user_id)).await
    }
}

/// Lock an order and check that `actor`, if any, takes part in it
async fn lock_participant_order(
    tx: &mut dyn MarketTx,
    order_id: OrderId,
    actor: Option<UserId>,
) -> OrderResult<Order> {
    let order = tx
        .lock_order(order_id)
        .await?
        .ok_or(OrderError::OrderNotFound(order_id))?;

    if let Some(user_id) = actor
        && !order.involves(user_id)
    {
        return Err(OrderError::NotParticipant { order_id, user_id });
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::NewUser;
    use crate::db::MemoryStore;
    use crate::inventory::{ItemStatus, NewItem, TransactionType};
    use crate::ledger::{Balances, LedgerError, LedgerManager};
    use crate::orders::ActionRequired;

    struct Fixture {
        store: Arc<MemoryStore>,
        orders: OrderManager,
        ledger: LedgerManager,
        buyer: UserId,
        seller: UserId,
        item: ItemId,
    }

    async fn fixture(wallet: i64, sale_price: i64) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let seller = store
            .insert_user(&NewUser::new("seller@example.com", "Seller"))
            .await
            .unwrap();
        let buyer = store
            .insert_user(&NewUser::new("buyer@example.com", "Buyer"))
            .await
            .unwrap();
        let item = store
            .insert_item(&NewItem {
                title: "Linen Midi Dress".to_string(),
                category: "Dresses".to_string(),
                brand: "Reformation".to_string(),
                size: "S".to_string(),
                condition: "A".to_string(),
                transaction_type: TransactionType::Both,
                sale_price: Some(sale_price),
                rent_price: Some(1000),
                deposit: Some(2000),
                image: "/assets/items/midi.png".to_string(),
                verified: true,
                seller_id: seller.id,
            })
            .await
            .unwrap();

        let ledger = LedgerManager::new(store.clone());
        ledger.top_up(buyer.id, wallet, None).await.unwrap();

        Fixture {
            orders: OrderManager::new(store.clone(), MarketConfig::default()),
            store,
            ledger,
            buyer: buyer.id,
            seller: seller.id,
            item: item.id,
        }
    }

    async fn item_status(f: &Fixture) -> ItemStatus {
        f.store.find_item(f.item).await.unwrap().unwrap().status
    }

    #[tokio::test]
    async fn test_buy_locks_escrow() {
        let f = fixture(10_000, 6000).await;
        let order = f
            .orders
            .create_order(f.buyer, f.item, OrderType::Buy)
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.action_required, Some(ActionRequired::ConfirmReceipt));
        assert_eq!(order.seller_id, f.seller);
        assert_eq!(f.ledger.balances(f.buyer).await.unwrap(), Balances::new(4000, 6000));
        assert_eq!(item_status(&f).await, ItemStatus::Processing);
    }

    #[tokio::test]
    async fn test_insufficient_funds_rolls_back() {
        let f = fixture(5000, 6000).await;
        let err = f
            .orders
            .create_order(f.buyer, f.item, OrderType::Buy)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrderError::Ledger(LedgerError::InsufficientFunds { .. })
        ));
        assert_eq!(f.ledger.balances(f.buyer).await.unwrap(), Balances::new(5000, 0));
        assert_eq!(item_status(&f).await, ItemStatus::Live);
        assert!(f.orders.orders_for_user(f.buyer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rent_uses_configured_days() {
        let f = fixture(10_000, 6000).await;
        let order = f
            .orders
            .create_order(f.buyer, f.item, OrderType::Rent)
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::ActiveRental);
        assert_eq!(order.escrow_amount, 3000);
        assert_eq!(order.deposit_locked, Some(2000));
        assert_eq!(order.days_remaining, Some(4));
        assert_eq!(item_status(&f).await, ItemStatus::Rented);
    }

    #[tokio::test]
    async fn test_delivered_then_closed_pays_seller() {
        let f = fixture(10_000, 6000).await;
        let order = f
            .orders
            .create_order(f.buyer, f.item, OrderType::Buy)
            .await
            .unwrap();

        let delivered = f
            .orders
            .advance_status(order.id, OrderStatus::Delivered, Some(f.buyer))
            .await
            .unwrap();
        assert_eq!(delivered.action_required, None);

        f.orders
            .advance_status(order.id, OrderStatus::Closed, Some(f.buyer))
            .await
            .unwrap();
        assert_eq!(f.ledger.balances(f.buyer).await.unwrap(), Balances::new(4000, 0));
        assert_eq!(f.ledger.balances(f.seller).await.unwrap(), Balances::new(6000, 0));
        assert_eq!(item_status(&f).await, ItemStatus::Live);
    }

    #[tokio::test]
    async fn test_closed_is_terminal() {
        let f = fixture(10_000, 6000).await;
        let order = f
            .orders
            .create_order(f.buyer, f.item, OrderType::Buy)
            .await
            .unwrap();
        f.orders
            .advance_status(order.id, OrderStatus::Delivered, None)
            .await
            .unwrap();
        f.orders
            .advance_status(order.id, OrderStatus::Closed, None)
            .await
            .unwrap();

        for target in OrderStatus::ALL {
            let err = f
                .orders
                .advance_status(order.id, target, None)
                .await
                .unwrap_err();
            assert!(matches!(err, OrderError::OrderAlreadyClosed(_)));
        }
        assert_eq!(f.ledger.balances(f.seller).await.unwrap(), Balances::new(6000, 0));
    }

    #[tokio::test]
    async fn test_outsider_cannot_advance() {
        let f = fixture(10_000, 6000).await;
        let order = f
            .orders
            .create_order(f.buyer, f.item, OrderType::Buy)
            .await
            .unwrap();
        let err = f
            .orders
            .advance_status(order.id, OrderStatus::Delivered, Some(9999))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::NotParticipant { .. }));
    }

    #[tokio::test]
    async fn test_seller_cannot_confirm_own_delivery() {
        let f = fixture(10_000, 6000).await;
        let order = f
            .orders
            .create_order(f.buyer, f.item, OrderType::Buy)
            .await
            .unwrap();

        let err = f
            .orders
            .advance_status(order.id, OrderStatus::Delivered, Some(f.seller))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::StepNotPermitted { .. }));

        f.orders
            .advance_status(order.id, OrderStatus::Delivered, Some(f.buyer))
            .await
            .unwrap();
        let err = f
            .orders
            .advance_status(order.id, OrderStatus::Closed, Some(f.seller))
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::StepNotPermitted { .. }));

        assert_eq!(f.ledger.balances(f.buyer).await.unwrap(), Balances::new(4000, 6000));
        assert_eq!(f.ledger.balances(f.seller).await.unwrap(), Balances::new(0, 0));
        assert_eq!(
            f.orders.get_order(order.id).await.unwrap().status,
            OrderStatus::Delivered
        );
    }

    #[tokio::test]
    async fn test_participants_cannot_close_dispute() {
        let f = fixture(10_000, 6000).await;
        let order = f
            .orders
            .create_order(f.buyer, f.item, OrderType::Buy)
            .await
            .unwrap();
        f.orders
            .advance_status(order.id, OrderStatus::Dispute, Some(f.seller))
            .await
            .unwrap();

        for user_id in [f.buyer, f.seller] {
            let err = f
                .orders
                .advance_status(order.id, OrderStatus::Closed, Some(user_id))
                .await
                .unwrap_err();
            assert_eq!(err.code(), "forbidden");
        }
        assert_eq!(
            f.orders.get_order(order.id).await.unwrap().status,
            OrderStatus::Dispute
        );

        let split = DisputeResolution {
            refund_to_buyer: 6000,
            release_to_seller: 0,
        };
        f.orders.resolve_dispute(order.id, split).await.unwrap();
        assert_eq!(f.ledger.balances(f.buyer).await.unwrap(), Balances::new(10_000, 0));
    }

    #[tokio::test]
    async fn test_resolve_dispute_split() {
        let f = fixture(10_000, 6000).await;
        let order = f
            .orders
            .create_order(f.buyer, f.item, OrderType::Buy)
            .await
            .unwrap();
        f.orders
            .raise_dispute(order.id, Some("Wrong size".to_string()), Some(f.buyer))
            .await
            .unwrap();

        let bad = DisputeResolution {
            refund_to_buyer: 1000,
            release_to_seller: 1000,
        };
        assert!(matches!(
            f.orders.resolve_dispute(order.id, bad).await,
            Err(OrderError::Validation(_))
        ));

        let split = DisputeResolution {
            refund_to_buyer: 4000,
            release_to_seller: 2000,
        };
        let closed = f.orders.resolve_dispute(order.id, split).await.unwrap();
        assert_eq!(closed.status, OrderStatus::Closed);
        assert_eq!(f.ledger.balances(f.buyer).await.unwrap(), Balances::new(8000, 0));
        assert_eq!(f.ledger.balances(f.seller).await.unwrap(), Balances::new(2000, 0));
        assert_eq!(item_status(&f).await, ItemStatus::Live);
    }

    #[tokio::test]
    async fn test_tick_rentals_until_overdue() {
        let f = fixture(10_000, 6000).await;
        let order = f
            .orders
            .create_order(f.buyer, f.item, OrderType::Rent)
            .await
            .unwrap();

        for _ in 0..3 {
            let report = f.orders.tick_rentals().await.unwrap();
            assert_eq!(report.decremented, vec![order.id]);
        }
        let report = f.orders.tick_rentals().await.unwrap();
        assert_eq!(report.overdue, vec![order.id]);

        let overdue = f.orders.get_order(order.id).await.unwrap();
        assert_eq!(overdue.status, OrderStatus::ActiveRental);
        assert_eq!(overdue.days_remaining, Some(0));
        assert_eq!(overdue.action_required, Some(ActionRequired::ReturnOverdue));
        assert_eq!(item_status(&f).await, ItemStatus::AwaitingPickup);

        let idle = f.orders.tick_rentals().await.unwrap();
        assert!(idle.decremented.is_empty() && idle.overdue.is_empty());
    }
}

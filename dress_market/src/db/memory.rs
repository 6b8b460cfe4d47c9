//! In-memory store for tests and demo mode.
//!
//! All state sits behind one async mutex. A transaction holds the lock for
//! its whole lifetime and works on a private copy of the state; `commit`
//! swaps the copy in, dropping the transaction discards it. Transactions are
//! therefore fully serialized, which is stricter than the row locks of the
//! PostgreSQL store but gives the same outcomes.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
    errors::{StoreError, StoreResult},
    repository::{MarketStore, MarketTx, OrderCounts},
};
use crate::accounts::{NewUser, User, UserId};
use crate::inventory::{Item, ItemFilter, ItemId, ItemStatus, NewItem};
use crate::ledger::{Balances, LedgerEntry, NewLedgerEntry};
use crate::orders::{NewOrder, Order, OrderFilter, OrderId, OrderStatus, OrderWithItem};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: BTreeMap<UserId, User>,
    items: BTreeMap<ItemId, Item>,
    orders: BTreeMap<OrderId, Order>,
    entries: Vec<LedgerEntry>,
    last_user_id: UserId,
    last_item_id: ItemId,
    last_order_id: OrderId,
    last_entry_id: i64,
}

impl MemoryState {
    fn add_user(&mut self, user: &NewUser) -> StoreResult<User> {
        if self.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "email {} already registered",
                user.email
            )));
        }
        self.last_user_id += 1;
        let created = User {
            id: self.last_user_id,
            email: user.email.clone(),
            name: user.name.clone(),
            trust_score: user.trust_score,
            balances: Balances::default(),
            avatar: user.avatar.clone(),
            created_at: Utc::now(),
        };
        self.users.insert(created.id, created.clone());
        Ok(created)
    }

    fn add_item(&mut self, item: &NewItem) -> StoreResult<Item> {
        if !self.users.contains_key(&item.seller_id) {
            return Err(StoreError::Conflict(format!(
                "seller {} does not exist",
                item.seller_id
            )));
        }
        self.last_item_id += 1;
        let created = Item {
            id: self.last_item_id,
            title: item.title.clone(),
            category: item.category.clone(),
            brand: item.brand.clone(),
            size: item.size.clone(),
            condition: item.condition.clone(),
            transaction_type: item.transaction_type,
            sale_price: item.sale_price,
            rent_price: item.rent_price,
            deposit: item.deposit,
            image: item.image.clone(),
            status: ItemStatus::Live,
            verified: item.verified,
            seller_id: item.seller_id,
            created_at: Utc::now(),
        };
        self.items.insert(created.id, created.clone());
        Ok(created)
    }

    fn counts<'a>(orders: impl Iterator<Item = &'a Order>) -> OrderCounts {
        orders.fold(OrderCounts::default(), |mut counts, order| {
            counts.total += 1;
            if order.status.is_open() {
                counts.open += 1;
            }
            counts
        })
    }
}

/// Process-local market store
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn MarketTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard: Some(guard),
            working,
        }))
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn insert_user(&self, user: &NewUser) -> StoreResult<User> {
        self.state.lock().await.add_user(user)
    }

    async fn find_user(&self, user_id: UserId) -> StoreResult<Option<User>> {
        Ok(self.state.lock().await.users.get(&user_id).cloned())
    }

    async fn insert_item(&self, item: &NewItem) -> StoreResult<Item> {
        self.state.lock().await.add_item(item)
    }

    async fn find_item(&self, item_id: ItemId) -> StoreResult<Option<Item>> {
        Ok(self.state.lock().await.items.get(&item_id).cloned())
    }

    async fn list_items(&self, filter: &ItemFilter) -> StoreResult<Vec<Item>> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .values()
            .filter(|item| filter.matches(item))
            .cloned()
            .collect())
    }

    async fn find_order(&self, order_id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&order_id).cloned())
    }

    async fn list_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<OrderWithItem>> {
        let state = self.state.lock().await;
        let mut joined = Vec::new();
        // Newest first; IDs grow with creation time
        for order in state.orders.values().rev().filter(|o| filter.matches(o)) {
            let item = state.items.get(&order.item_id).cloned().ok_or_else(|| {
                StoreError::corrupt("orders", format!("order {} has no item", order.id))
            })?;
            joined.push(OrderWithItem {
                order: order.clone(),
                item,
            });
        }
        Ok(joined)
    }

    async fn ledger_entries(&self, user_id: UserId, limit: i64) -> StoreResult<Vec<LedgerEntry>> {
        let state = self.state.lock().await;
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(state
            .entries
            .iter()
            .rev()
            .filter(|entry| entry.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Transaction over a [`MemoryStore`]
pub struct MemoryTx {
    guard: Option<OwnedMutexGuard<MemoryState>>,
    working: MemoryState,
}

impl MemoryTx {
    fn state(&mut self) -> StoreResult<&mut MemoryState> {
        if self.guard.is_none() {
            return Err(StoreError::TransactionFinished);
        }
        Ok(&mut self.working)
    }
}

#[async_trait]
impl MarketTx for MemoryTx {
    async fn lock_user(&mut self, user_id: UserId) -> StoreResult<Option<User>> {
        Ok(self.state()?.users.get(&user_id).cloned())
    }

    async fn lock_item(&mut self, item_id: ItemId) -> StoreResult<Option<Item>> {
        Ok(self.state()?.items.get(&item_id).cloned())
    }

    async fn lock_order(&mut self, order_id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.state()?.orders.get(&order_id).cloned())
    }

    async fn lock_active_rentals(&mut self) -> StoreResult<Vec<Order>> {
        Ok(self
            .state()?
            .orders
            .values()
            .filter(|o| {
                o.status == OrderStatus::ActiveRental
                    && o.days_remaining.is_some_and(|days| days > 0)
            })
            .cloned()
            .collect())
    }

    async fn count_orders_for_user(&mut self, user_id: UserId) -> StoreResult<OrderCounts> {
        let state = self.state()?;
        Ok(MemoryState::counts(
            state.orders.values().filter(|o| o.involves(user_id)),
        ))
    }

    async fn count_orders_for_item(&mut self, item_id: ItemId) -> StoreResult<OrderCounts> {
        let state = self.state()?;
        Ok(MemoryState::counts(
            state.orders.values().filter(|o| o.item_id == item_id),
        ))
    }

    async fn update_balances(&mut self, user: &User) -> StoreResult<()> {
        if user.balances.wallet < 0 || user.balances.escrow < 0 {
            return Err(StoreError::Conflict(format!(
                "negative balance for user {}",
                user.id
            )));
        }
        if let Some(stored) = self.state()?.users.get_mut(&user.id) {
            stored.balances = user.balances;
        }
        Ok(())
    }

    async fn update_item_status(&mut self, item: &Item) -> StoreResult<()> {
        if let Some(stored) = self.state()?.items.get_mut(&item.id) {
            stored.status = item.status;
        }
        Ok(())
    }

    async fn insert_order(&mut self, order: &NewOrder) -> StoreResult<Order> {
        let state = self.state()?;
        if state
            .orders
            .values()
            .any(|o| o.item_id == order.item_id && o.status.is_open())
        {
            return Err(StoreError::Conflict(format!(
                "item {} already has an open order",
                order.item_id
            )));
        }

        state.last_order_id += 1;
        let now = Utc::now();
        let created = Order {
            id: state.last_order_id,
            item_id: order.item_id,
            buyer_id: order.buyer_id,
            seller_id: order.seller_id,
            order_type: order.order_type,
            status: order.status,
            escrow_amount: order.escrow_amount,
            deposit_locked: order.deposit_locked,
            days_remaining: order.days_remaining,
            action_required: order.action_required,
            dispute_reason: None,
            created_at: now,
            updated_at: now,
        };
        state.orders.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_order(&mut self, order: &Order) -> StoreResult<()> {
        if let Some(stored) = self.state()?.orders.get_mut(&order.id) {
            stored.status = order.status;
            stored.days_remaining = order.days_remaining;
            stored.action_required = order.action_required;
            stored.dispute_reason = order.dispute_reason.clone();
            stored.updated_at = order.updated_at;
        }
        Ok(())
    }

    async fn insert_entry(&mut self, entry: &NewLedgerEntry) -> StoreResult<LedgerEntry> {
        let state = self.state()?;
        state.last_entry_id += 1;
        let created = LedgerEntry {
            id: state.last_entry_id,
            user_id: entry.user_id,
            order_id: entry.order_id,
            entry_type: entry.entry_type,
            amount: entry.amount,
            wallet_after: entry.wallet_after,
            escrow_after: entry.escrow_after,
            description: entry.description.clone(),
            created_at: Utc::now(),
        };
        state.entries.push(created.clone());
        Ok(created)
    }

    async fn delete_user(&mut self, user_id: UserId) -> StoreResult<()> {
        let state = self.state()?;
        if state.orders.values().any(|o| o.involves(user_id)) {
            return Err(StoreError::Conflict(format!(
                "user {user_id} is referenced by orders"
            )));
        }
        state.users.remove(&user_id);
        state.items.retain(|_, item| item.seller_id != user_id);
        state.entries.retain(|entry| entry.user_id != user_id);
        Ok(())
    }

    async fn delete_item(&mut self, item_id: ItemId) -> StoreResult<()> {
        let state = self.state()?;
        if state.orders.values().any(|o| o.item_id == item_id) {
            return Err(StoreError::Conflict(format!(
                "item {item_id} is referenced by orders"
            )));
        }
        state.items.remove(&item_id);
        Ok(())
    }

    async fn commit(&mut self) -> StoreResult<()> {
        let mut guard = self.guard.take().ok_or(StoreError::TransactionFinished)?;
        *guard = std::mem::take(&mut self.working);
        Ok(())
    }
}

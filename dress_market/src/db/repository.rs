//! Storage traits.
//!
//! A [`MarketStore`] is the storage handle passed explicitly to every
//! manager. Reads go straight through it; every mutation opens one
//! [`MarketTx`], locks the rows it touches, writes, and commits. Dropping a
//! transaction without committing rolls it back, so an early `?` return or an
//! expired deadline never leaves partial writes behind.

use async_trait::async_trait;

use super::errors::StoreResult;
use crate::accounts::{NewUser, User, UserId};
use crate::inventory::{Item, ItemFilter, ItemId, NewItem};
use crate::ledger::{LedgerEntry, NewLedgerEntry};
use crate::orders::{NewOrder, Order, OrderFilter, OrderId, OrderWithItem};

/// How many orders reference a user or item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrderCounts {
    pub open: usize,
    pub total: usize,
}

/// Storage handle
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Start a transaction
    async fn begin(&self) -> StoreResult<Box<dyn MarketTx>>;

    /// Check that the backing store answers
    async fn health_check(&self) -> StoreResult<()>;

    /// Create a user with empty balances
    async fn insert_user(&self, user: &NewUser) -> StoreResult<User>;

    /// Find user by ID
    async fn find_user(&self, user_id: UserId) -> StoreResult<Option<User>>;

    /// Create a live listing
    async fn insert_item(&self, item: &NewItem) -> StoreResult<Item>;

    /// Find item by ID
    async fn find_item(&self, item_id: ItemId) -> StoreResult<Option<Item>>;

    /// List items matching `filter`, oldest first
    async fn list_items(&self, filter: &ItemFilter) -> StoreResult<Vec<Item>>;

    /// Find order by ID
    async fn find_order(&self, order_id: OrderId) -> StoreResult<Option<Order>>;

    /// List orders matching `filter`, joined with their items, newest first
    async fn list_orders(&self, filter: &OrderFilter) -> StoreResult<Vec<OrderWithItem>>;

    /// Most recent ledger entries for a user, newest first
    async fn ledger_entries(&self, user_id: UserId, limit: i64) -> StoreResult<Vec<LedgerEntry>>;
}

/// One open transaction. Row locks are held until commit or drop.
#[async_trait]
pub trait MarketTx: Send {
    /// Load and lock a user row
    async fn lock_user(&mut self, user_id: UserId) -> StoreResult<Option<User>>;

    /// Load and lock an item row
    async fn lock_item(&mut self, item_id: ItemId) -> StoreResult<Option<Item>>;

    /// Load and lock an order row
    async fn lock_order(&mut self, order_id: OrderId) -> StoreResult<Option<Order>>;

    /// Load and lock every rental still counting down, in ID order
    async fn lock_active_rentals(&mut self) -> StoreResult<Vec<Order>>;

    /// Orders referencing a user as buyer or seller
    async fn count_orders_for_user(&mut self, user_id: UserId) -> StoreResult<OrderCounts>;

    /// Orders referencing an item
    async fn count_orders_for_item(&mut self, item_id: ItemId) -> StoreResult<OrderCounts>;

    /// Write a user's wallet and escrow balances
    async fn update_balances(&mut self, user: &User) -> StoreResult<()>;

    /// Write an item's status
    async fn update_item_status(&mut self, item: &Item) -> StoreResult<()>;

    /// Insert an order
    async fn insert_order(&mut self, order: &NewOrder) -> StoreResult<Order>;

    /// Write an order's mutable fields
    async fn update_order(&mut self, order: &Order) -> StoreResult<()>;

    /// Append a ledger entry
    async fn insert_entry(&mut self, entry: &NewLedgerEntry) -> StoreResult<LedgerEntry>;

    /// Delete a user row
    async fn delete_user(&mut self, user_id: UserId) -> StoreResult<()>;

    /// Delete an item row
    async fn delete_item(&mut self, item_id: ItemId) -> StoreResult<()>;

    /// Make every write visible. The handle is spent afterwards.
    async fn commit(&mut self) -> StoreResult<()>;
}

//! # Dress Market
//!
//! Order lifecycle and escrow accounting for a secondhand fashion
//! marketplace where items are bought or rented.
//!
//! ## Architecture
//!
//! Buyers pay into escrow when they place an order. Funds stay there while
//! the order moves through its lifecycle and are paid to the seller once the
//! buyer confirms delivery, or split by support when the order is disputed:
//!
//! - **Shipped** / **ActiveRental**: escrow locked, item reserved
//! - **Delivered**: buyer confirmed receipt
//! - **Dispute**: escrow frozen until support decides a split
//! - **Closed**: escrow settled, item back on the market
//!
//! Every step runs as one storage transaction: balance changes, ledger
//! entries, item status and order row commit together or not at all.
//!
//! ## Core Modules
//!
//! - [`orders`]: order state machine and [`OrderManager`]
//! - [`ledger`]: wallet/escrow balance rules and the audit ledger
//! - [`inventory`]: listings and item availability
//! - [`accounts`]: marketplace users
//! - [`db`]: storage traits with PostgreSQL and in-memory implementations
//!
//! ## Example
//!
//! ```
//! use dress_market::{MarketConfig, MemoryStore, OrderManager};
//! use std::sync::Arc;
//!
//! let orders = OrderManager::new(Arc::new(MemoryStore::new()), MarketConfig::default());
//! assert_eq!(orders.config().rental_days, 4);
//! ```

/// Marketplace user accounts.
pub mod accounts;

/// Storage traits, PostgreSQL and in-memory stores, timeouts.
pub mod db;

/// Bearer-token identity boundary.
pub mod identity;

/// Listings and item availability.
pub mod inventory;

/// Wallet and escrow balances with an audit ledger.
pub mod ledger;

/// Order lifecycle and settlement.
pub mod orders;

/// Demo data for local runs.
pub mod seed;

pub use accounts::{AccountManager, User, UserId};
pub use db::{Database, DatabaseConfig, MarketStore, MemoryStore, PgMarketStore};
pub use identity::{AuthError, IdentityProvider, UserIdentity};
pub use inventory::{InventoryManager, Item, ItemId, ItemStatus};
pub use ledger::{Amount, Balances, LedgerManager};
pub use orders::{MarketConfig, Order, OrderId, OrderManager, OrderStatus, OrderType};

//! Orders module: purchase and rental lifecycle with escrow.
//!
//! This module implements:
//! - The order state machine (`Shipped`/`ActiveRental` -> `Delivered` ->
//!   `Closed`, with `Dispute` reachable from any open status)
//! - Atomic order creation: escrow lock, item reservation and order insert
//!   commit together or not at all
//! - Settlement on close, explicit dispute resolution and the daily rental
//!   countdown
//!
//! ## Example
//!
//! ```no_run
//! use dress_market::db::MemoryStore;
//! use dress_market::orders::{MarketConfig, OrderManager, OrderStatus, OrderType};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orders = OrderManager::new(Arc::new(MemoryStore::new()), MarketConfig::default());
//!
//!     let order = orders.create_order(2, 1, OrderType::Buy).await?;
//!     orders.advance_status(order.id, OrderStatus::Delivered, Some(2)).await?;
//!     orders.advance_status(order.id, OrderStatus::Closed, Some(2)).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod errors;
pub mod manager;
pub mod models;
pub mod state_machine;

pub use config::{DEFAULT_RENTAL_DAYS, MarketConfig};
pub use errors::{OrderError, OrderResult};
pub use manager::OrderManager;
pub use models::{
    ActionRequired, DisputeResolution, NewOrder, Order, OrderFilter, OrderId, OrderStatus,
    OrderType, OrderWithItem, RentalTickReport,
};
pub use state_machine::{RentalTick, Settlement, check_transition, open_order};

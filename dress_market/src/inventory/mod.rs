//! Inventory module: listings and their availability.
//!
//! An item is `Live` exactly when no open order references it. Reservation
//! and release happen inside the order transactions; see
//! [`crate::orders::OrderManager`].

pub mod availability;
pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{InventoryError, InventoryResult};
pub use manager::InventoryManager;
pub use models::{Item, ItemFilter, ItemId, ItemStatus, NewItem, TransactionType};

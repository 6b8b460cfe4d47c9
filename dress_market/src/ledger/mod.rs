//! Ledger module: wallet and escrow balances with an append-only audit trail.
//!
//! This module implements:
//! - All-or-nothing balance rules on [`Balances`] snapshots
//! - One [`LedgerEntry`] per balance movement per user, written in the same
//!   transaction as the movement
//! - External top-ups, the only way funds enter the marketplace
//!
//! ## Example
//!
//! ```no_run
//! use dress_market::db::{Database, PgMarketStore};
//! use dress_market::ledger::LedgerManager;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let store = Arc::new(PgMarketStore::new(Arc::new(db.pool().clone())));
//!     let ledger = LedgerManager::new(store);
//!
//!     let balances = ledger.top_up(1, 45_000, Some("Opening balance".into())).await?;
//!     println!("Wallet: {}", balances.wallet);
//!
//!     Ok(())
//! }
//! ```

pub mod balances;
pub mod errors;
pub mod manager;
pub mod models;

pub use balances::{ensure_positive, refund_escrow_to_buyer, release_escrow_to_seller};
pub use errors::{LedgerError, LedgerResult};
pub use manager::{DEFAULT_ENTRY_LIMIT, LedgerManager};
pub use models::{Amount, Balances, EntryType, LedgerEntry, NewLedgerEntry};

//! Ledger data models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::accounts::UserId;
use crate::orders::OrderId;

/// Money in minor currency units
pub type Amount = i64;

/// A user's two balances. Both stay non-negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balances {
    /// Funds the user can spend
    #[serde(rename = "wallet_balance")]
    pub wallet: Amount,
    /// Funds locked against the user's pending orders
    #[serde(rename = "escrow_balance")]
    pub escrow: Amount,
}

impl Balances {
    pub fn new(wallet: Amount, escrow: Amount) -> Self {
        Self { wallet, escrow }
    }

    /// Wallet plus escrow
    pub fn total(&self) -> Amount {
        self.wallet + self.escrow
    }
}

/// Ledger entry model. One row per balance movement per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub user_id: UserId,
    pub order_id: Option<OrderId>,
    pub entry_type: EntryType,
    /// Magnitude of the movement; direction follows from `entry_type`
    pub amount: Amount,
    pub wallet_after: Amount,
    pub escrow_after: Amount,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Ledger entry about to be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub user_id: UserId,
    pub order_id: Option<OrderId>,
    pub entry_type: EntryType,
    pub amount: Amount,
    pub wallet_after: Amount,
    pub escrow_after: Amount,
    pub description: Option<String>,
}

/// Entry type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// External funds credited to the wallet
    TopUp,
    /// Wallet to escrow, when an order is placed
    EscrowLock,
    /// Escrow paid out to the counterparty
    EscrowRelease,
    /// Counterparty's wallet credited from someone's escrow
    Payout,
    /// Escrow returned to the wallet
    Refund,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::TopUp => "top_up",
            EntryType::EscrowLock => "escrow_lock",
            EntryType::EscrowRelease => "escrow_release",
            EntryType::Payout => "payout",
            EntryType::Refund => "refund",
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top_up" => Ok(EntryType::TopUp),
            "escrow_lock" => Ok(EntryType::EscrowLock),
            "escrow_release" => Ok(EntryType::EscrowRelease),
            "payout" => Ok(EntryType::Payout),
            "refund" => Ok(EntryType::Refund),
            other => Err(format!("unknown entry type {other:?}")),
        }
    }
}

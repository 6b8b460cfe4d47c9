//! Storage error types.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by a [`MarketStore`](super::MarketStore) or one of its transactions
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failure
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The enclosing transaction ran past its deadline and was rolled back
    #[error("Transaction timed out after {0:?}")]
    Timeout(Duration),

    /// A uniqueness constraint rejected the write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored value could not be mapped back onto a domain type
    #[error("Corrupt row in {table}: {detail}")]
    CorruptRow { table: &'static str, detail: String },

    /// The transaction handle was used after commit
    #[error("Transaction already finished")]
    TransactionFinished,
}

impl StoreError {
    pub(crate) fn corrupt(table: &'static str, detail: impl Into<String>) -> Self {
        StoreError::CorruptRow {
            table,
            detail: detail.into(),
        }
    }
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

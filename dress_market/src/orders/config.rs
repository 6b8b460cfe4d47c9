//! Order lifecycle configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::db::{DEFAULT_TRANSACTION_TIMEOUT, config::parse_env_or};

/// Default rental length in days
pub const DEFAULT_RENTAL_DAYS: i32 = 4;

/// Market configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Days a new rental runs before the return is overdue
    pub rental_days: i32,

    /// Deadline for one order transaction
    pub transaction_timeout: Duration,
}

impl MarketConfig {
    /// Load configuration from environment variables
    ///
    /// Reads `RENTAL_DAYS` and `TRANSACTION_TIMEOUT_SECS`. Invalid or
    /// non-positive values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let rental_days = match parse_env_or("RENTAL_DAYS", defaults.rental_days) {
            days if days > 0 => days,
            _ => defaults.rental_days,
        };
        let timeout_secs = match parse_env_or(
            "TRANSACTION_TIMEOUT_SECS",
            defaults.transaction_timeout.as_secs(),
        ) {
            0 => defaults.transaction_timeout.as_secs(),
            secs => secs,
        };

        Self {
            rental_days,
            transaction_timeout: Duration::from_secs(timeout_secs),
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            rental_days: DEFAULT_RENTAL_DAYS,
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MarketConfig::default();
        assert_eq!(config.rental_days, 4);
        assert_eq!(config.transaction_timeout, Duration::from_secs(10));
    }
}

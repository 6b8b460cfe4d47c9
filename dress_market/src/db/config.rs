//! Database configuration module.
//!
//! Provides configuration structures for database connection management.

use std::env;
use std::str::FromStr;

/// Connection string used when `DATABASE_URL` is not set
pub const DEVELOPMENT_DATABASE_URL: &str = "postgres://postgres@localhost/dress_market";

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub database_url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,

    /// Idle connection timeout in seconds
    pub idle_timeout_secs: u64,

    /// Maximum connection lifetime in seconds
    pub max_lifetime_secs: u64,
}

impl DatabaseConfig {
    /// Create configuration from environment variables
    ///
    /// Expected environment variables:
    /// - `DATABASE_URL`: PostgreSQL connection string (default: local development database)
    /// - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 20)
    /// - `DB_MIN_CONNECTIONS`: Minimum pool size (default: 5)
    /// - `DB_CONNECTION_TIMEOUT`: Connection timeout in seconds (default: 10)
    /// - `DB_IDLE_TIMEOUT`: Idle timeout in seconds (default: 600)
    /// - `DB_MAX_LIFETIME`: Max lifetime in seconds (default: 1800)
    ///
    /// Unparseable numeric values fall back to their defaults and are logged.
    pub fn from_env() -> Self {
        let defaults = Self::development();
        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            max_connections: parse_env_or("DB_MAX_CONNECTIONS", defaults.max_connections),
            min_connections: parse_env_or("DB_MIN_CONNECTIONS", defaults.min_connections),
            connection_timeout_secs: parse_env_or(
                "DB_CONNECTION_TIMEOUT",
                defaults.connection_timeout_secs,
            ),
            idle_timeout_secs: parse_env_or("DB_IDLE_TIMEOUT", defaults.idle_timeout_secs),
            max_lifetime_secs: parse_env_or("DB_MAX_LIFETIME", defaults.max_lifetime_secs),
        }
    }

    /// Create a default configuration for development
    ///
    /// Uses [`DEVELOPMENT_DATABASE_URL`] as the database URL
    pub fn development() -> Self {
        Self {
            database_url: DEVELOPMENT_DATABASE_URL.to_string(),
            max_connections: 20,
            min_connections: 5,
            connection_timeout_secs: 10,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::development()
    }
}

/// Read and parse an environment variable, falling back to `default`
pub fn parse_env_or<T: FromStr + Copy>(var: &str, default: T) -> T {
    match env::var(var) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            log::warn!("Ignoring invalid value {raw:?} for {var}");
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_development_defaults() {
        let config = DatabaseConfig::default();
        assert_eq!(config.database_url, DEVELOPMENT_DATABASE_URL);
        assert_eq!(config.max_connections, 20);
        assert!(config.min_connections <= config.max_connections);
    }

    #[test]
    fn test_parse_env_or_falls_back() {
        assert_eq!(parse_env_or("DRESS_MARKET_TEST_UNSET_VARIABLE", 42u32), 42);
    }
}

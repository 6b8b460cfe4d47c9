//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use dress_market::{DatabaseConfig, MarketConfig};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Bind address used when neither `--bind` nor `SERVER_BIND` is set
pub const DEFAULT_BIND: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080);

/// Seconds between rental ticks when `RENTAL_TICK_SECS` is unset
pub const DEFAULT_RENTAL_TICK_SECS: u64 = 86_400;

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Order lifecycle settings
    pub market: MarketConfig,
    /// Interval between rental ticks
    pub rental_tick: Duration,
}

/// Security-related configuration
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// HS256 secret shared with the identity service (required)
    pub jwt_secret: String,
    /// Key expected in `x-support-key` on support endpoints (required)
    pub support_api_key: String,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => match std::env::var("SERVER_BIND") {
                Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                    var: "SERVER_BIND".to_string(),
                    reason: format!("{raw:?} is not an IP:PORT address"),
                })?,
                Err(_) => DEFAULT_BIND,
            },
        };

        let mut database = DatabaseConfig::from_env();
        if let Some(url) = database_url_override {
            database.database_url = url;
        }

        // Security configuration (REQUIRED)
        let jwt_secret = std::env::var("JWT_SECRET").map_err(|_| ConfigError::MissingRequired {
            var: "JWT_SECRET".to_string(),
            hint: "Use the secret the identity service signs tokens with".to_string(),
        })?;

        let support_api_key =
            std::env::var("SUPPORT_API_KEY").map_err(|_| ConfigError::MissingRequired {
                var: "SUPPORT_API_KEY".to_string(),
                hint: "Generate with: openssl rand -hex 16".to_string(),
            })?;

        let config = ServerConfig {
            bind,
            database,
            security: SecurityConfig {
                jwt_secret,
                support_api_key,
            },
            market: MarketConfig::from_env(),
            rental_tick: Duration::from_secs(parse_env_or(
                "RENTAL_TICK_SECS",
                DEFAULT_RENTAL_TICK_SECS,
            )),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET".to_string(),
                reason: "Must be at least 32 characters (128-bit security)".to_string(),
            });
        }

        if self.security.support_api_key.len() < 16 {
            return Err(ConfigError::Invalid {
                var: "SUPPORT_API_KEY".to_string(),
                reason: "Must be at least 16 characters".to_string(),
            });
        }

        if self.rental_tick.is_zero() {
            return Err(ConfigError::Invalid {
                var: "RENTAL_TICK_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

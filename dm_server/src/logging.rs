//! Structured logging configuration.
//!
//! The library logs through the `log` facade; the subscriber installed here
//! picks those records up alongside the server's own `tracing` events.

use dress_market::orders::RentalTickReport;
use dress_market::UserId;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var.
///
/// # Example
///
/// ```no_run
/// use dm_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log security event with structured data
///
/// # Example
///
/// ```
/// use dm_server::logging::log_security_event;
///
/// log_security_event("invalid_token", None, "Signature mismatch");
/// ```
pub fn log_security_event(event_type: &str, user_id: Option<UserId>, message: &str) {
    tracing::warn!(
        event_type = event_type,
        user_id = user_id,
        "SECURITY: {}",
        message
    );
}

/// Log the outcome of one rental tick
pub fn log_rental_tick(report: &RentalTickReport) {
    if report.overdue.is_empty() {
        tracing::debug!(
            decremented = report.decremented.len(),
            "Rental tick completed"
        );
    } else {
        tracing::info!(
            decremented = report.decremented.len(),
            overdue = ?report.overdue,
            "Rental tick completed with overdue rentals"
        );
    }
}

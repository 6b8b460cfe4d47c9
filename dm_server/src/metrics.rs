//! Prometheus metrics for the marketplace server.
//!
//! Metrics are rendered in Prometheus text format by the `/api/v1/metrics`
//! endpoint from a recorder installed at startup.
//!
//! # Metrics Categories
//!
//! - **HTTP Metrics**: request counts and durations by status
//! - **Order Metrics**: orders created, status transitions, disputes
//! - **Ledger Metrics**: funds moved into and out of escrow
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use dm_server::metrics;
//!
//! let handle = metrics::init_metrics().unwrap();
//! metrics::orders_created_total("buy");
//! println!("{}", handle.render());
//! ```

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and return a handle for rendering.
///
/// Only one recorder can be installed per process; a second call fails.
pub fn init_metrics() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
pub fn http_requests_total(method: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Order Metrics
// ============================================================================

/// Increment orders created counter.
pub fn orders_created_total(order_type: &str) {
    metrics::counter!("orders_created_total",
        "type" => order_type.to_string()
    )
    .increment(1);
}

/// Increment status transitions counter.
pub fn order_transitions_total(to: &str) {
    metrics::counter!("order_transitions_total",
        "to" => to.to_string()
    )
    .increment(1);
}

/// Increment disputes resolved by support.
pub fn disputes_resolved_total() {
    metrics::counter!("disputes_resolved_total").increment(1);
}

/// Set the number of rentals that went overdue on the last tick.
pub fn rentals_overdue(count: usize) {
    metrics::gauge!("rentals_overdue").set(count as f64);
}

// ============================================================================
// Ledger Metrics
// ============================================================================

/// Record escrow locked by a new order.
pub fn escrow_locked_amount(amount: i64) {
    metrics::histogram!("escrow_locked_amount").record(amount as f64);
}

/// Increment wallet top-ups counter.
pub fn top_ups_total() {
    metrics::counter!("top_ups_total").increment(1);
}

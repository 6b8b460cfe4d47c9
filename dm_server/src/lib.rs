//! HTTP server for the dress market order and escrow core.
//!
//! Exposes the [`dress_market`] managers over an axum router, verifies
//! bearer tokens issued by the identity service, and runs the periodic
//! rental tick.

pub mod api;
pub mod config;
pub mod jwt;
pub mod logging;
pub mod metrics;

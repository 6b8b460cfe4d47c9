//! HTTP API for the marketplace.
//!
//! # Modules
//!
//! - [`items`]: public listing reads
//! - [`orders`]: placing and moving orders (bearer token)
//! - [`users`]: account, profile and ledger reads (bearer token)
//! - [`support`]: dispute resolution, top-ups, rental ticks (support key)
//! - [`middleware`]: bearer token and support key guards
//! - [`error`]: domain error to HTTP response mapping
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use dm_server::api::{AppState, create_router};
//! use dm_server::jwt::JwtIdentity;
//! use dress_market::{MarketConfig, MemoryStore};
//! use std::sync::Arc;
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!
//! let state = AppState::new(
//!     Arc::new(MemoryStore::new()),
//!     MarketConfig::default(),
//!     Arc::new(JwtIdentity::new("a-secret-of-at-least-thirty-two-chars")),
//!     "support-key-0123456789",
//!     None,
//! );
//!
//! let app = create_router(state);
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CORS
//!
//! CORS is configured permissively for development. In production, configure
//! appropriate origins, methods, and headers.

pub mod error;
pub mod items;
pub mod middleware;
pub mod orders;
pub mod request_id;
pub mod support;
pub mod users;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Json},
    routing::{get, post},
};
use dress_market::identity::IdentityProvider;
use dress_market::{
    AccountManager, InventoryManager, LedgerManager, MarketConfig, MarketStore, OrderManager,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Application state shared across all HTTP handlers.
///
/// Cloned for each request (cheap due to Arc wrappers).
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MarketStore>,
    pub accounts: Arc<AccountManager>,
    pub inventory: Arc<InventoryManager>,
    pub ledger: Arc<LedgerManager>,
    pub orders: Arc<OrderManager>,
    pub identity: Arc<dyn IdentityProvider>,
    pub support_api_key: Arc<str>,
    /// Absent when no recorder was installed; `/metrics` then answers 503
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Build the managers over one store
    pub fn new(
        store: Arc<dyn MarketStore>,
        market: MarketConfig,
        identity: Arc<dyn IdentityProvider>,
        support_api_key: &str,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            accounts: Arc::new(AccountManager::new(store.clone())),
            inventory: Arc::new(InventoryManager::new(store.clone())),
            ledger: Arc::new(LedgerManager::new(store.clone())),
            orders: Arc::new(OrderManager::new(store.clone(), market)),
            store,
            identity,
            support_api_key: Arc::from(support_api_key),
            metrics,
        }
    }
}

/// Create the complete API router with all endpoints and middleware.
///
/// # Endpoint Summary
///
/// ```text
/// GET  /api/v1/health                            - Health check (public)
/// GET  /api/v1/metrics                           - Prometheus metrics (public)
/// GET  /api/v1/items                             - List items (public)
/// GET  /api/v1/items/{id}                        - Get item (public)
/// GET  /api/v1/users/{id}                        - Public profile (public)
/// POST /api/v1/orders                            - Place order (auth required)
/// GET  /api/v1/orders                            - Caller's orders (auth required)
/// GET  /api/v1/orders/{id}                       - Get order (auth required)
/// POST /api/v1/orders/{id}/status                - Advance status (auth required)
/// POST /api/v1/orders/{id}/dispute               - Raise dispute (auth required)
/// GET  /api/v1/users/me                          - Caller's account (auth required)
/// GET  /api/v1/users/me/ledger                   - Caller's ledger (auth required)
/// POST /api/v1/support/orders/{id}/resolve       - Resolve dispute (support key)
/// POST /api/v1/support/users/{id}/top-up         - Top up wallet (support key)
/// POST /api/v1/support/rentals/tick              - Run rental tick (support key)
/// ```
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", create_v1_router(state.clone()))
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn create_v1_router(state: AppState) -> Router<AppState> {
    // Public routes (no authentication middleware)
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(render_metrics))
        .route("/items", get(items::list_items))
        .route("/items/{item_id}", get(items::get_item))
        .route("/users/{user_id}", get(users::profile));

    // Buyer and seller routes (bearer token)
    let protected_routes = Router::new()
        .route("/orders", post(orders::create_order).get(orders::list_orders))
        .route("/orders/{order_id}", get(orders::get_order))
        .route("/orders/{order_id}/status", post(orders::advance_status))
        .route("/orders/{order_id}/dispute", post(orders::raise_dispute))
        .route("/users/me", get(users::me))
        .route("/users/me/ledger", get(users::my_ledger))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    // Support routes (shared key)
    let support_routes = Router::new()
        .route(
            "/support/orders/{order_id}/resolve",
            post(support::resolve_dispute),
        )
        .route("/support/users/{user_id}/top-up", post(support::top_up))
        .route("/support/rentals/tick", post(support::tick_rentals))
        .layer(axum::middleware::from_fn_with_state(
            state,
            middleware::support_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(support_routes)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` when the store answers, `503 Service Unavailable`
/// otherwise.
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store_healthy = state.store.health_check().await.is_ok();

    let status_code = if store_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if store_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": store_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}

/// Prometheus text exposition
async fn render_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

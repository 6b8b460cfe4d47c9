//! HTTP API tests over the in-memory store.
//!
//! Each test builds its own router and mints tokens with the same secret the
//! server verifies them with.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Duration;
use dm_server::api::{AppState, create_router, middleware::SUPPORT_KEY_HEADER};
use dm_server::jwt::JwtIdentity;
use dress_market::accounts::{NewUser, UserId};
use dress_market::inventory::{ItemId, NewItem, TransactionType};
use dress_market::{MarketConfig, MemoryStore};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt; // For `oneshot` method

const JWT_SECRET: &str = "integration_test_secret_0123456789abcdef";
const SUPPORT_KEY: &str = "support-key-for-integration-tests";

struct TestApp {
    router: Router,
    state: AppState,
    identity: Arc<JwtIdentity>,
    seller: UserId,
    buyer: UserId,
    item: ItemId,
}

/// Helper to build a router with one seller, one funded buyer and one listing
async fn test_app(buyer_wallet: i64) -> TestApp {
    let identity = Arc::new(JwtIdentity::new(JWT_SECRET));
    let state = AppState::new(
        Arc::new(MemoryStore::new()),
        MarketConfig::default(),
        identity.clone(),
        SUPPORT_KEY,
        None,
    );

    let seller = state
        .accounts
        .create_user(NewUser::new("alex@example.com", "Alex Rivera").with_trust_score(92))
        .await
        .unwrap()
        .id;
    let buyer = state
        .accounts
        .create_user(NewUser::new("jordan@example.com", "Jordan Lee"))
        .await
        .unwrap()
        .id;
    if buyer_wallet > 0 {
        state.ledger.top_up(buyer, buyer_wallet, None).await.unwrap();
    }

    let item = state
        .inventory
        .list_item(NewItem {
            title: "Vintage Silk Slip Dress".to_string(),
            category: "Dresses".to_string(),
            brand: "Reformation".to_string(),
            size: "S".to_string(),
            condition: "A".to_string(),
            transaction_type: TransactionType::Both,
            sale_price: Some(6000),
            rent_price: Some(1200),
            deposit: Some(3000),
            image: "/assets/items/silk-slip.png".to_string(),
            verified: true,
            seller_id: seller,
        })
        .await
        .unwrap()
        .id;

    TestApp {
        router: create_router(state.clone()),
        state,
        identity,
        seller,
        buyer,
        item,
    }
}

impl TestApp {
    fn token(&self, user_id: UserId) -> String {
        self.identity
            .issue_token(user_id, None, Duration::minutes(15))
            .unwrap()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    async fn get(&self, uri: &str, user: Option<UserId>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(user_id) = user {
            builder = builder.header("Authorization", format!("Bearer {}", self.token(user_id)));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post(&self, uri: &str, user: Option<UserId>, body: Value) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json");
        if let Some(user_id) = user {
            builder = builder.header("Authorization", format!("Bearer {}", self.token(user_id)));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn support_post(&self, uri: &str, key: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .header(SUPPORT_KEY_HEADER, key)
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn place_order(&self, order_type: &str) -> i64 {
        let (status, order) = self
            .post(
                "/api/v1/orders",
                Some(self.buyer),
                json!({ "item_id": self.item, "order_type": order_type }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "unexpected body: {order}");
        order["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_health_check_and_request_id() {
    let app = test_app(0).await;

    let request = Request::builder()
        .uri("/api/v1/health")
        .header("x-request-id", "req-42")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-request-id"], "req-42");

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_metrics_without_recorder() {
    let app = test_app(0).await;
    let (status, _) = app.get("/api/v1/metrics", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_items_are_public() {
    let app = test_app(0).await;

    let (status, items) = app.get("/api/v1/items?status=live", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(items.as_array().unwrap().len(), 1);
    assert_eq!(items[0]["type"], "both");

    let (status, item) = app.get(&format!("/api/v1/items/{}", app.item), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item["status"], "live");

    let (status, body) = app.get("/api/v1/items/9999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_orders_require_bearer_token() {
    let app = test_app(10_000).await;

    let (status, body) = app
        .post(
            "/api/v1/orders",
            None,
            json!({ "item_id": app.item, "order_type": "buy" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "missing_token");

    let request = Request::builder()
        .uri("/api/v1/users/me")
        .header("Authorization", "Bearer not-a-real-token")
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid_token");
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let app = test_app(0).await;
    let token = app
        .identity
        .issue_token(app.buyer, None, Duration::minutes(-10))
        .unwrap();

    let request = Request::builder()
        .uri("/api/v1/users/me")
        .header("Authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "token_expired");
}

#[tokio::test]
async fn test_purchase_flow_over_http() {
    let app = test_app(10_000).await;

    let (status, order) = app
        .post(
            "/api/v1/orders",
            Some(app.buyer),
            json!({ "item_id": app.item, "order_type": "buy" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(order["status"], "shipped");
    assert_eq!(order["escrow_amount"], 6000);
    let order_id = order["id"].as_i64().unwrap();

    let (_, me) = app.get("/api/v1/users/me", Some(app.buyer)).await;
    assert_eq!(me["wallet_balance"], 4000);
    assert_eq!(me["escrow_balance"], 6000);

    let (_, item) = app.get(&format!("/api/v1/items/{}", app.item), None).await;
    assert_eq!(item["status"], "processing");

    for target in ["delivered", "closed"] {
        let (status, order) = app
            .post(
                &format!("/api/v1/orders/{order_id}/status"),
                Some(app.buyer),
                json!({ "target_status": target }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(order["status"], target);
    }

    let (_, seller) = app.get("/api/v1/users/me", Some(app.seller)).await;
    assert_eq!(seller["wallet_balance"], 6000);
    let (_, buyer) = app.get("/api/v1/users/me", Some(app.buyer)).await;
    assert_eq!(buyer["escrow_balance"], 0);

    let (_, item) = app.get(&format!("/api/v1/items/{}", app.item), None).await;
    assert_eq!(item["status"], "live");

    let (status, body) = app
        .post(
            &format!("/api/v1/orders/{order_id}/status"),
            Some(app.buyer),
            json!({ "target_status": "delivered" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "order_already_closed");
}

#[tokio::test]
async fn test_insufficient_funds_over_http() {
    let app = test_app(5000).await;

    let (status, body) = app
        .post(
            "/api/v1/orders",
            Some(app.buyer),
            json!({ "item_id": app.item, "order_type": "buy" }),
        )
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "insufficient_funds");

    let (_, me) = app.get("/api/v1/users/me", Some(app.buyer)).await;
    assert_eq!(me["wallet_balance"], 5000);
    assert_eq!(me["escrow_balance"], 0);
}

#[tokio::test]
async fn test_seller_cannot_order_own_item() {
    let app = test_app(0).await;
    app.state.ledger.top_up(app.seller, 10_000, None).await.unwrap();

    let (status, body) = app
        .post(
            "/api/v1/orders",
            Some(app.seller),
            json!({ "item_id": app.item, "order_type": "buy" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_party");
}

#[tokio::test]
async fn test_second_order_conflicts() {
    let app = test_app(20_000).await;
    app.place_order("rent").await;

    let (status, body) = app
        .post(
            "/api/v1/orders",
            Some(app.buyer),
            json!({ "item_id": app.item, "order_type": "buy" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "item_not_available");
}

#[tokio::test]
async fn test_outsider_cannot_touch_order() {
    let app = test_app(10_000).await;
    let order_id = app.place_order("buy").await;
    let outsider = app
        .state
        .accounts
        .create_user(NewUser::new("sam@example.com", "Sam"))
        .await
        .unwrap()
        .id;

    let (status, body) = app
        .post(
            &format!("/api/v1/orders/{order_id}/status"),
            Some(outsider),
            json!({ "target_status": "delivered" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "not_participant");

    let (status, _) = app
        .get(&format!("/api/v1/orders/{order_id}"), Some(outsider))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .get(&format!("/api/v1/orders?user_id={}", app.buyer), Some(outsider))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_seller_cannot_settle_sale() {
    let app = test_app(10_000).await;
    let order_id = app.place_order("buy").await;
    let uri = format!("/api/v1/orders/{order_id}/status");

    let (status, body) = app
        .post(&uri, Some(app.seller), json!({ "target_status": "delivered" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = app
        .post(&uri, Some(app.buyer), json!({ "target_status": "delivered" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post(&uri, Some(app.seller), json!({ "target_status": "closed" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (_, seller) = app.get("/api/v1/users/me", Some(app.seller)).await;
    assert_eq!(seller["wallet_balance"], 0);
    let (_, buyer) = app.get("/api/v1/users/me", Some(app.buyer)).await;
    assert_eq!(buyer["escrow_balance"], 6000);
}

#[tokio::test]
async fn test_participants_cannot_close_dispute() {
    let app = test_app(10_000).await;
    let order_id = app.place_order("buy").await;

    let (status, _) = app
        .post(
            &format!("/api/v1/orders/{order_id}/dispute"),
            Some(app.buyer),
            json!({ "reason": "Wrong colour" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    for user in [app.seller, app.buyer] {
        let (status, body) = app
            .post(
                &format!("/api/v1/orders/{order_id}/status"),
                Some(user),
                json!({ "target_status": "closed" }),
            )
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");
    }

    let (_, order) = app
        .get(&format!("/api/v1/orders/{order_id}"), Some(app.buyer))
        .await;
    assert_eq!(order["status"], "dispute");

    let (status, order) = app
        .support_post(
            &format!("/api/v1/support/orders/{order_id}/resolve"),
            SUPPORT_KEY,
            json!({ "refund_to_buyer": 6000, "release_to_seller": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "closed");

    let (_, buyer) = app.get("/api/v1/users/me", Some(app.buyer)).await;
    assert_eq!(buyer["wallet_balance"], 10_000);
    assert_eq!(buyer["escrow_balance"], 0);
}

#[tokio::test]
async fn test_order_history_includes_item() {
    let app = test_app(10_000).await;
    let order_id = app.place_order("rent").await;

    for user in [app.buyer, app.seller] {
        let (status, orders) = app.get("/api/v1/orders", Some(user)).await;
        assert_eq!(status, StatusCode::OK);
        let orders = orders.as_array().unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0]["id"], order_id);
        assert_eq!(orders[0]["status"], "active_rental");
        assert_eq!(orders[0]["days_remaining"], 4);
        assert_eq!(orders[0]["item"]["title"], "Vintage Silk Slip Dress");
    }
}

#[tokio::test]
async fn test_dispute_resolved_by_support() {
    let app = test_app(10_000).await;
    let order_id = app.place_order("buy").await;

    let (status, order) = app
        .post(
            &format!("/api/v1/orders/{order_id}/dispute"),
            Some(app.buyer),
            json!({ "reason": "Arrived with a torn hem" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "dispute");
    assert_eq!(order["dispute_reason"], "Arrived with a torn hem");

    let split = json!({ "refund_to_buyer": 4000, "release_to_seller": 2000 });
    let uri = format!("/api/v1/support/orders/{order_id}/resolve");

    let (status, _) = app.support_post(&uri, "wrong-key", split.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .support_post(
            &uri,
            SUPPORT_KEY,
            json!({ "refund_to_buyer": 1000, "release_to_seller": 1000 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, order) = app.support_post(&uri, SUPPORT_KEY, split).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "closed");

    let (_, buyer) = app.get("/api/v1/users/me", Some(app.buyer)).await;
    assert_eq!(buyer["wallet_balance"], 8000);
    assert_eq!(buyer["escrow_balance"], 0);
    let (_, seller) = app.get("/api/v1/users/me", Some(app.seller)).await;
    assert_eq!(seller["wallet_balance"], 2000);
}

#[tokio::test]
async fn test_support_top_up_and_ledger() {
    let app = test_app(0).await;

    let (status, balances) = app
        .support_post(
            &format!("/api/v1/support/users/{}/top-up", app.buyer),
            SUPPORT_KEY,
            json!({ "amount": 2500, "description": "Card payment" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balances["wallet_balance"], 2500);

    let (status, body) = app
        .support_post(
            &format!("/api/v1/support/users/{}/top-up", app.buyer),
            SUPPORT_KEY,
            json!({ "amount": 0 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, entries) = app.get("/api/v1/users/me/ledger", Some(app.buyer)).await;
    assert_eq!(status, StatusCode::OK);
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["entry_type"], "top_up");
    assert_eq!(entries[0]["amount"], 2500);
}

#[tokio::test]
async fn test_support_rental_tick() {
    let app = test_app(10_000).await;
    let order_id = app.place_order("rent").await;

    let (status, report) = app
        .support_post("/api/v1/support/rentals/tick", SUPPORT_KEY, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["decremented"], json!([order_id]));
    assert_eq!(report["overdue"], json!([]));

    let (_, order) = app
        .get(&format!("/api/v1/orders/{order_id}"), Some(app.buyer))
        .await;
    assert_eq!(order["days_remaining"], 3);
}

#[tokio::test]
async fn test_public_profile_hides_private_fields() {
    let app = test_app(10_000).await;

    let (status, profile) = app
        .get(&format!("/api/v1/users/{}", app.seller), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["name"], "Alex Rivera");
    assert_eq!(profile["trust_score"], 92);
    assert_eq!(profile["live_listings"], 1);
    assert!(profile.get("email").is_none());
    assert!(profile.get("wallet_balance").is_none());
}

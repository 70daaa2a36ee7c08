use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::{Value, json};

use storedesk_api::app::{build_app_with, services::AppServices};
use storedesk_auth::JwtClaims;
use storedesk_catalog::{Product, Store};
use storedesk_core::{Money, ProductId, StoreId, UserId};
use storedesk_infra::{
    AppConfig, CatalogRepository, CheckoutSession, InMemoryRepository, OrderRepository,
    PaymentError, PaymentGateway, UserRepository,
};
use storedesk_sales::Order;

const JWT_SECRET: &str = "test-secret";

struct TestServer {
    base_url: String,
    repo: Arc<InMemoryRepository>,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(AppConfig {
            jwt_secret: JWT_SECRET.to_string(),
            order_stream_interval: Duration::from_millis(50),
            ..AppConfig::default()
        })
        .await
    }

    async fn spawn_with(config: AppConfig) -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let services = AppServices::new(config, repo.clone());
        Self::serve(repo, services).await
    }

    async fn spawn_with_gateway(gateway: Arc<dyn PaymentGateway>) -> Self {
        let repo = Arc::new(InMemoryRepository::new());
        let config = AppConfig {
            jwt_secret: JWT_SECRET.to_string(),
            ..AppConfig::default()
        };
        let services = AppServices::new(config, repo.clone()).with_payments(gateway);
        Self::serve(repo, services).await
    }

    async fn serve(repo: Arc<InMemoryRepository>, services: AppServices) -> Self {
        // Same router as prod, in-memory backend, ephemeral port.
        let app = build_app_with(Arc::new(services));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            repo,
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn seed_store(&self, owner: &UserId, age_days: i64) -> Store {
        let store = Store::new(
            StoreId::new(),
            "Corner Shop",
            owner.clone(),
            Utc::now() - ChronoDuration::days(age_days),
        )
        .unwrap();
        self.repo.insert_store(&store).await.unwrap();
        store
    }

    async fn seed_product(&self, store: &Store, name: &str, price: u64, stock: u32) -> Product {
        let product = Product::new(
            ProductId::new(),
            store.id,
            name,
            Money::from_minor(price),
            stock,
            Utc::now(),
        );
        self.repo.insert_product(&product).await.unwrap();
        product
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn mint_jwt(sub: &UserId) -> String {
    let claims = JwtClaims::new(sub.clone(), Utc::now(), ChronoDuration::minutes(10))
        .with_email("owner@example.com");

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn checkout(client: &reqwest::Client, srv: &TestServer, store: &Store, product: &Product, qty: u32) -> Value {
    let res = client
        .post(srv.url(&format!("/api/storefront/{}/checkout", store.id)))
        .json(&json!({
            "items": [{ "product_id": product.id, "quantity": qty }],
            "customer": { "name": "Ann", "email": "ann@example.com" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

async fn pay(client: &reqwest::Client, srv: &TestServer, order_id: &str) -> Value {
    let res = client
        .post(srv.url("/api/webhooks/payments"))
        .json(&json!({
            "type": "checkout.session.completed",
            "data": { "object": {
                "metadata": { "order_id": order_id },
                "customer_details": { "phone": "555-0100", "address": { "line1": "1 Main St", "city": "Springfield" } }
            }}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

async fn set_status(
    client: &reqwest::Client,
    srv: &TestServer,
    token: &str,
    store: &Store,
    order_id: &str,
    status: &str,
) -> reqwest::Response {
    client
        .patch(srv.url(&format!("/api/stores/{}/orders/{}/status", store.id, order_id)))
        .bearer_auth(token)
        .json(&json!({ "status": status }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/api/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(srv.url("/api/whoami"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn principal_is_derived_from_token() {
    let srv = TestServer::spawn().await;
    let owner = user("user_owner");

    let res = reqwest::Client::new()
        .get(srv.url("/api/whoami"))
        .bearer_auth(mint_jwt(&owner))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["user_id"], "user_owner");
    assert_eq!(body["email"], "owner@example.com");
}

#[tokio::test]
async fn foreign_or_missing_store_is_method_not_allowed() {
    let srv = TestServer::spawn().await;
    let owner = user("user_owner");
    let store = srv.seed_store(&owner, 0).await;
    let client = reqwest::Client::new();

    let intruder = mint_jwt(&user("user_intruder"));
    let res = client
        .get(srv.url(&format!("/api/stores/{}/orders", store.id)))
        .bearer_auth(&intruder)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);

    let res = client
        .get(srv.url(&format!("/api/stores/{}/orders", StoreId::new())))
        .bearer_auth(mint_jwt(&owner))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn order_lifecycle_checkout_pay_ship_deliver() {
    let srv = TestServer::spawn().await;
    let owner = user("user_owner");
    let token = mint_jwt(&owner);
    let store = srv.seed_store(&owner, 0).await;
    let mug = srv.seed_product(&store, "Mug", 1_250, 10).await;
    let client = reqwest::Client::new();

    let session = checkout(&client, &srv, &store, &mug, 3).await;
    let order_id = session["order_id"].as_str().unwrap().to_string();
    assert!(session["url"].as_str().unwrap().contains(&order_id));

    let paid = pay(&client, &srv, &order_id).await;
    assert_eq!(paid["outcome"], "applied");
    assert_eq!(paid["status"], "PAID");

    // Redelivery of the same event is harmless.
    assert_eq!(pay(&client, &srv, &order_id).await["outcome"], "skipped");

    let res = set_status(&client, &srv, &token, &store, &order_id, "SHIPPED").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["order"]["status"], "SHIPPED");
    assert_eq!(body["order"]["customer"]["phone"], "555-0100");
    assert_eq!(body["stock_changes"].as_array().unwrap().len(), 1);
    assert_eq!(body["stock_changes"][0]["old_stock"], 10);
    assert_eq!(body["stock_changes"][0]["new_stock"], 7);

    // Delivery decrements again from the shipped level.
    let res = set_status(&client, &srv, &token, &store, &order_id, "delivered").await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["order"]["status"], "DELIVERED");
    assert_eq!(body["stock_changes"].as_array().unwrap().len(), 1);
    assert_eq!(body["stock_changes"][0]["old_stock"], 7);
    assert_eq!(body["stock_changes"][0]["new_stock"], 4);

    let history: Value = client
        .get(srv.url(&format!("/api/stores/{}/stock-history?product_id={}", store.id, mug.id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history.as_array().unwrap().len(), 2);
    assert_eq!(
        history[0]["reason"],
        format!("Order {order_id} marked DELIVERED")
    );
    assert_eq!(
        history[1]["reason"],
        format!("Order {order_id} marked SHIPPED")
    );
    assert_eq!(history[0]["actor"], "user_owner");

    // Delivered is terminal.
    let res = set_status(&client, &srv, &token, &store, &order_id, "CANCELLED").await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_status_is_rejected() {
    let srv = TestServer::spawn().await;
    let owner = user("user_owner");
    let store = srv.seed_store(&owner, 0).await;
    let mug = srv.seed_product(&store, "Mug", 500, 2).await;
    let client = reqwest::Client::new();

    let session = checkout(&client, &srv, &store, &mug, 1).await;
    let order_id = session["order_id"].as_str().unwrap();

    let res = set_status(&client, &srv, &mint_jwt(&owner), &store, order_id, "LOST").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(res.text().await.unwrap().contains("LOST"));
}

#[tokio::test]
async fn checkout_rejects_more_than_available() {
    let srv = TestServer::spawn().await;
    let store = srv.seed_store(&user("user_owner"), 0).await;
    let mug = srv.seed_product(&store, "Mug", 500, 2).await;

    let res = reqwest::Client::new()
        .post(srv.url(&format!("/api/storefront/{}/checkout", store.id)))
        .json(&json!({ "items": [{ "product_id": mug.id, "quantity": 5 }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert!(res.text().await.unwrap().contains("only 2"));
}

struct UnavailableGateway;

#[async_trait::async_trait]
impl PaymentGateway for UnavailableGateway {
    async fn create_checkout_session(
        &self,
        _store: &Store,
        _order: &Order,
    ) -> Result<CheckoutSession, PaymentError> {
        Err(PaymentError::Gateway("provider unavailable".into()))
    }
}

#[tokio::test]
async fn failed_checkout_session_leaves_no_pending_order() {
    let srv = TestServer::spawn_with_gateway(Arc::new(UnavailableGateway)).await;
    let store = srv.seed_store(&user("user_owner"), 0).await;
    let mug = srv.seed_product(&store, "Mug", 500, 4).await;

    let res = reqwest::Client::new()
        .post(srv.url(&format!("/api/storefront/{}/checkout", store.id)))
        .json(&json!({ "items": [{ "product_id": mug.id, "quantity": 1 }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(srv.repo.list_orders(store.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn refund_cancels_paid_order() {
    let srv = TestServer::spawn().await;
    let owner = user("user_owner");
    let store = srv.seed_store(&owner, 0).await;
    let mug = srv.seed_product(&store, "Mug", 500, 4).await;
    let client = reqwest::Client::new();

    let order_id = checkout(&client, &srv, &store, &mug, 1).await["order_id"]
        .as_str()
        .unwrap()
        .to_string();
    pay(&client, &srv, &order_id).await;

    let res = client
        .post(srv.url("/api/webhooks/payments"))
        .json(&json!({
            "type": "charge.refunded",
            "data": { "object": { "metadata": { "order_id": order_id } } }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "CANCELLED");
}

#[tokio::test]
async fn payment_webhook_secret_is_enforced_when_configured() {
    let srv = TestServer::spawn_with(AppConfig {
        jwt_secret: JWT_SECRET.to_string(),
        payments_webhook_secret: Some("whsec".to_string()),
        ..AppConfig::default()
    })
    .await;
    let client = reqwest::Client::new();
    let event = json!({ "type": "invoice.paid" });

    let res = client
        .post(srv.url("/api/webhooks/payments"))
        .json(&event)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .post(srv.url("/api/webhooks/payments"))
        .header("x-webhook-secret", "whsec")
        .json(&event)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["outcome"], "ignored");
}

#[tokio::test]
async fn revenue_series_covers_every_day_since_store_creation() {
    let srv = TestServer::spawn().await;
    let owner = user("user_owner");
    let store = srv.seed_store(&owner, 2).await;
    let mug = srv.seed_product(&store, "Mug", 2_000, 10).await;
    let client = reqwest::Client::new();

    let order_id = checkout(&client, &srv, &store, &mug, 1).await["order_id"]
        .as_str()
        .unwrap()
        .to_string();
    pay(&client, &srv, &order_id).await;

    let res = client
        .get(srv.url(&format!("/api/stores/{}/analytics/revenue", store.id)))
        .bearer_auth(mint_jwt(&owner))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();

    let days = body["days"].as_array().unwrap();
    assert_eq!(days.len(), 3);
    assert_eq!(days[0]["growth"], 0.0);
    assert_eq!(days[0]["trend"], "stable");
    assert_eq!(days[2]["total"], 2_000);
    assert_eq!(days[2]["growth"], 100.0);
    assert_eq!(days[2]["trend"], "up");
}

#[tokio::test]
async fn overview_and_customers_reflect_paid_orders() {
    let srv = TestServer::spawn().await;
    let owner = user("user_owner");
    let token = mint_jwt(&owner);
    let store = srv.seed_store(&owner, 0).await;
    let mug = srv.seed_product(&store, "Mug", 1_000, 3).await;
    srv.seed_product(&store, "Plate", 800, 40).await;
    let client = reqwest::Client::new();

    let order_id = checkout(&client, &srv, &store, &mug, 2).await["order_id"]
        .as_str()
        .unwrap()
        .to_string();
    pay(&client, &srv, &order_id).await;
    checkout(&client, &srv, &store, &mug, 1).await;

    let overview: Value = client
        .get(srv.url(&format!("/api/stores/{}/analytics/overview", store.id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(overview["total_revenue"], 2_000);
    assert_eq!(overview["sales_count"], 1);
    assert_eq!(overview["stock_count"], 43);
    assert_eq!(overview["low_stock"][0]["name"], "Mug");

    let customers: Value = client
        .get(srv.url(&format!("/api/stores/{}/customers", store.id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let customers = customers.as_array().unwrap();
    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0]["order_count"], 2);
    assert_eq!(customers[0]["total_spent"], 2_000);
}

#[tokio::test]
async fn order_list_filters_and_deletes() {
    let srv = TestServer::spawn().await;
    let owner = user("user_owner");
    let token = mint_jwt(&owner);
    let store = srv.seed_store(&owner, 0).await;
    let mug = srv.seed_product(&store, "Mug", 1_000, 10).await;
    let lamp = srv.seed_product(&store, "Desk Lamp", 4_000, 10).await;
    let client = reqwest::Client::new();

    let mug_order = checkout(&client, &srv, &store, &mug, 1).await["order_id"]
        .as_str()
        .unwrap()
        .to_string();
    checkout(&client, &srv, &store, &lamp, 1).await;
    pay(&client, &srv, &mug_order).await;

    let list = |query: &'static str| {
        let client = client.clone();
        let url = srv.url(&format!("/api/stores/{}/orders{}", store.id, query));
        let token = token.clone();
        async move {
            let res = client.get(url).bearer_auth(token).send().await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
            res.json::<Vec<Value>>().await.unwrap()
        }
    };

    assert_eq!(list("").await.len(), 2);
    assert_eq!(list("?search=lamp").await.len(), 1);
    assert_eq!(list("?status=paid").await[0]["id"], mug_order.as_str());
    assert_eq!(list("?sort=amount_desc").await[0]["amount"], 4_000);

    let res = client
        .delete(srv.url(&format!("/api/stores/{}/orders/{}", store.id, mug_order)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_eq!(list("").await.len(), 1);

    let res = client
        .get(srv.url(&format!("/api/stores/{}/orders/{}", store.id, mug_order)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn manual_stock_adjustment_is_ledgered() {
    let srv = TestServer::spawn().await;
    let owner = user("user_owner");
    let token = mint_jwt(&owner);
    let store = srv.seed_store(&owner, 0).await;
    let mug = srv.seed_product(&store, "Mug", 1_000, 4).await;
    let client = reqwest::Client::new();

    let res = client
        .patch(srv.url(&format!("/api/stores/{}/products/{}/stock", store.id, mug.id)))
        .bearer_auth(&token)
        .json(&json!({ "stock": 12, "note": "delivery from supplier" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["displayed_stock"], 12);
    assert_eq!(body["entry"]["reason"], "Manual adjustment: delivery from supplier");

    let res = client
        .patch(srv.url(&format!("/api/stores/{}/products/{}/stock", store.id, ProductId::new())))
        .bearer_auth(&token)
        .json(&json!({ "stock": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn identity_webhook_syncs_users() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/api/webhooks/identity"))
        .json(&json!({
            "type": "user.created",
            "data": {
                "id": "user_new",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "primary_email_address_id": "e1",
                "email_addresses": [{ "id": "e1", "email_address": "ada@example.com" }]
            }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let stored = srv.repo.get_user(&user("user_new")).await.unwrap().unwrap();
    assert_eq!(stored.email, "ada@example.com");

    let res = client
        .post(srv.url("/api/webhooks/identity"))
        .json(&json!({ "type": "user.deleted", "data": { "id": "user_new" } }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(srv.repo.get_user(&user("user_new")).await.unwrap().is_none());
}

#[tokio::test]
async fn order_stream_pushes_full_list() {
    let srv = TestServer::spawn().await;
    let owner = user("user_owner");
    let store = srv.seed_store(&owner, 0).await;
    let mug = srv.seed_product(&store, "Mug", 1_000, 10).await;
    let client = reqwest::Client::new();
    let older = checkout(&client, &srv, &store, &mug, 1).await["order_id"]
        .as_str()
        .unwrap()
        .to_string();
    tokio::time::sleep(Duration::from_millis(5)).await;
    let newer = checkout(&client, &srv, &store, &mug, 2).await["order_id"]
        .as_str()
        .unwrap()
        .to_string();

    let mut res = client
        .get(srv.url(&format!("/api/stores/{}/orders/stream", store.id)))
        .bearer_auth(mint_jwt(&owner))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let mut received = String::new();
    while !received.contains("\n\n") {
        let chunk = tokio::time::timeout(Duration::from_secs(5), res.chunk())
            .await
            .expect("stream stalled")
            .unwrap()
            .expect("stream ended");
        received.push_str(&String::from_utf8_lossy(&chunk));
    }
    assert!(received.contains("event: orders"));
    // Newest first, as the repository lists them.
    let newer_at = received.find(&newer).expect("newer order missing");
    let older_at = received.find(&older).expect("older order missing");
    assert!(newer_at < older_at);
}

//! Shared harness for HTTP tests: an in-memory app behind `axum-test`.

#![allow(dead_code, clippy::unwrap_used)]

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::{TestResponse, TestServer};
use serde_json::{json, Value};
use shop::auth::{Claims, TokenVerifier};
use shop::checkout::MockPaymentGateway;
use shop::config::Config;
use shop::server::{build_router, AppState, Repositories};
use std::sync::Arc;
use storefront_testing::mocks::{epoch, ManualClock};

/// Merchant secret the mock gateway signs with
pub const GATEWAY_SECRET: &str = "test-gateway-secret";
/// Key tokens are signed with
pub const TOKEN_SECRET: &str = "test-token-secret";

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub clock: ManualClock,
    gateway: MockPaymentGateway,
    verifier: TokenVerifier,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_gateway(MockPaymentGateway::new(GATEWAY_SECRET))
    }

    pub fn with_gateway(gateway: MockPaymentGateway) -> Self {
        Self::build(Repositories::in_memory(), gateway)
    }

    pub fn with_repositories(repos: Repositories) -> Self {
        Self::build(repos, MockPaymentGateway::new(GATEWAY_SECRET))
    }

    fn build(repos: Repositories, gateway: MockPaymentGateway) -> Self {
        let config = Config::from_lookup(|key| match key {
            "RAZORPAY_KEY_SECRET" => Some(GATEWAY_SECRET.to_string()),
            "AUTH_TOKEN_SECRET" => Some(TOKEN_SECRET.to_string()),
            _ => None,
        })
        .unwrap();
        let clock = ManualClock::new(epoch());
        let state = AppState::new(
            &config,
            repos,
            Arc::new(gateway.clone()),
            Arc::new(clock.clone()),
        );
        let server = TestServer::new(build_router(state.clone())).unwrap();
        Self {
            server,
            state,
            clock,
            gateway,
            verifier: TokenVerifier::new(TOKEN_SECRET),
        }
    }

    pub fn token(&self, user: &str) -> String {
        self.verifier.issue(&Claims::customer(user, user)).unwrap()
    }

    pub fn admin_token(&self) -> String {
        self.verifier.issue(&Claims::admin("admin")).unwrap()
    }

    pub fn sign(&self, gateway_order_id: &str, gateway_payment_id: &str) -> String {
        self.gateway.sign(gateway_order_id, gateway_payment_id)
    }

    pub async fn get(&self, path: &str, token: &str) -> TestResponse {
        let (name, value) = bearer(token);
        self.server.get(path).add_header(name, value).await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> TestResponse {
        let (name, value) = bearer(token);
        self.server.post(path).add_header(name, value).json(&body).await
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> TestResponse {
        let (name, value) = bearer(token);
        self.server.put(path).add_header(name, value).json(&body).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> TestResponse {
        let (name, value) = bearer(token);
        self.server.delete(path).add_header(name, value).await
    }

    /// List a product through the admin API and return its id.
    pub async fn product(&self, name: &str, price: u64, stock: u32) -> u64 {
        let response = self
            .post(
                "/products",
                &self.admin_token(),
                json!({"name": name, "new_price": price, "old_price": price, "stock": stock}),
            )
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        response.json::<Value>()["product"]["id"].as_u64().unwrap()
    }

    pub async fn reserve(&self, token: &str, product: u64) -> TestResponse {
        self.post("/cart/add", token, json!({"productId": product})).await
    }

    /// Reserve one unit and pay for it; returns the committed order.
    pub async fn paid_order(&self, token: &str, product: u64, payment_id: &str) -> Value {
        assert_eq!(self.reserve(token, product).await.status_code(), StatusCode::OK);
        let intent = self.post("/payment/create-order", token, json!({})).await.json::<Value>();
        let gateway_order_id = intent["order"]["id"].as_str().unwrap().to_string();
        let response = self
            .post(
                "/payment/verify-and-save",
                token,
                json!({
                    "razorpay_order_id": gateway_order_id,
                    "razorpay_payment_id": payment_id,
                    "razorpay_signature": self.sign(&gateway_order_id, payment_id),
                    "address": {"name": "Asha", "phone": "9000000000", "street": "1 MG Road",
                                "city": "Pune", "state": "MH", "pincode": "411001", "country": "India"},
                    "cartItems": [{"id": product, "name": "Item", "price": 1, "quantity": 1}],
                    "total": 1
                }),
            )
            .await;
        assert_eq!(response.status_code(), StatusCode::CREATED);
        response.json::<Value>()["order"].clone()
    }

    pub async fn stock(&self, product: u64) -> u64 {
        let response = self.server.get(&format!("/product/{product}")).await;
        response.json::<Value>()["product"]["stock"].as_u64().unwrap()
    }
}

pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("authorization"),
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    )
}

pub fn error_code(response: &TestResponse) -> String {
    response.json::<Value>()["code"].as_str().unwrap_or_default().to_string()
}

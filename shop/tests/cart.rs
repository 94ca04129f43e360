#![allow(clippy::unwrap_used)]

mod common;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use common::{error_code, TestApp};
use serde_json::{json, Value};

#[tokio::test]
async fn release_returns_units_and_ignores_empty_lines() {
    let app = TestApp::new();
    let alice = app.token("alice");
    let lamp = app.product("Lamp", 50, 3).await;
    let desk = app.product("Desk", 120, 1).await;

    app.reserve(&alice, lamp).await;
    app.reserve(&alice, lamp).await;
    app.reserve(&alice, desk).await;

    let cart = app.get("/cart", &alice).await.json::<Value>();
    assert_eq!(cart["cart"], json!({lamp.to_string(): 2, desk.to_string(): 1}));
    assert_eq!(cart["total"], 220.0);

    let released = app
        .post("/cart/remove", &alice, json!({"productId": lamp.to_string()}))
        .await
        .json::<Value>();
    assert_eq!(released["stock"], 2);
    assert_eq!(released["cart"][lamp.to_string()], 1);

    app.post("/cart/remove", &alice, json!({"productId": lamp})).await;
    let noop = app.post("/cart/remove", &alice, json!({"productId": lamp})).await;
    assert_eq!(noop.status_code(), StatusCode::OK);
    let noop = noop.json::<Value>();
    assert_eq!(noop["stock"], 3);
    assert_eq!(noop["cart"], json!({desk.to_string(): 1}));
}

#[tokio::test]
async fn removed_products_drop_out_of_the_total() {
    let app = TestApp::new();
    let alice = app.token("alice");
    let lamp = app.product("Lamp", 50, 3).await;
    app.reserve(&alice, lamp).await;

    let deleted = app.delete(&format!("/products/{lamp}"), &app.admin_token()).await;
    assert_eq!(deleted.status_code(), StatusCode::OK);

    let cart = app.get("/cart", &alice).await.json::<Value>();
    assert_eq!(cart["total"], 0.0);
}

#[tokio::test]
async fn unknown_and_malformed_products_are_rejected() {
    let app = TestApp::new();
    let alice = app.token("alice");

    let missing = app.reserve(&alice, 999).await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

    let malformed = app.post("/cart/add", &alice, json!({"productId": "lamp"})).await;
    assert_eq!(malformed.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&malformed), "VALIDATION_ERROR");

    let absent = app.post("/cart/add", &alice, json!({})).await;
    assert_eq!(absent.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cart_needs_a_valid_token() {
    let app = TestApp::new();
    let lamp = app.product("Lamp", 50, 3).await;

    let anonymous = app.server.post("/cart/add").json(&json!({"productId": lamp})).await;
    assert_eq!(anonymous.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&anonymous), "UNAUTHORIZED");

    let legacy = app
        .server
        .get("/cart")
        .add_header(
            HeaderName::from_static("auth-token"),
            HeaderValue::from_str(&app.token("alice")).unwrap(),
        )
        .await;
    assert_eq!(legacy.status_code(), StatusCode::OK);
    assert_eq!(legacy.json::<Value>()["cart"], json!({}));
}

#[tokio::test]
async fn concurrent_reservations_never_oversell() {
    let app = TestApp::new();
    let lamp = app.product("Lamp", 50, 5).await;
    let tokens: Vec<String> = (0..12).map(|i| app.token(&format!("user-{i}"))).collect();

    let attempts = tokens.iter().map(|token| app.reserve(token, lamp));
    let responses = futures::future::join_all(attempts).await;
    let granted = responses
        .iter()
        .filter(|r| r.status_code() == StatusCode::OK)
        .count();

    assert_eq!(granted, 5);
    assert_eq!(app.stock(lamp).await, 0);
}

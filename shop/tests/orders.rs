#![allow(clippy::unwrap_used)]

mod common;

use axum::http::StatusCode;
use common::{error_code, TestApp};
use serde_json::{json, Value};

#[tokio::test]
async fn admins_walk_an_order_through_its_lifecycle() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let alice = app.token("alice");
    let lamp = app.product("Lamp", 1, 3).await;
    let order = app.paid_order(&alice, lamp, "pay_a").await;
    let path = format!("/orders/update-status/{}", order["id"].as_str().unwrap());

    let shipped = app.put(&path, &admin, json!({"status": "Shipped"})).await;
    assert_eq!(shipped.status_code(), StatusCode::OK);
    assert_eq!(shipped.json::<Value>()["order"]["status"], "Shipped");

    let backwards = app.put(&path, &admin, json!({"status": "Paid"})).await;
    assert_eq!(backwards.status_code(), StatusCode::CONFLICT);
    assert_eq!(error_code(&backwards), "CONFLICT");

    let delivered = app.put(&path, &admin, json!({"status": "Delivered"})).await;
    assert_eq!(delivered.json::<Value>()["order"]["status"], "Delivered");

    let cancelled = app.put(&path, &admin, json!({"status": "Cancelled"})).await;
    assert_eq!(cancelled.status_code(), StatusCode::CONFLICT);

    let unknown = app.put(&path, &admin, json!({"status": "Lost"})).await;
    assert_eq!(unknown.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn customers_see_only_their_own_orders() {
    let app = TestApp::new();
    let alice = app.token("alice");
    let bob = app.token("bob");
    let lamp = app.product("Lamp", 1, 3).await;
    let order = app.paid_order(&alice, lamp, "pay_a").await;
    app.paid_order(&bob, lamp, "pay_b").await;

    let path = format!("/order/{}", order["id"].as_str().unwrap());
    let own = app.get(&path, &alice).await;
    assert_eq!(own.status_code(), StatusCode::OK);
    assert_eq!(own.json::<Value>()["order"]["userId"], "alice");

    let foreign = app.get(&path, &bob).await;
    assert_eq!(foreign.status_code(), StatusCode::NOT_FOUND);

    let mine = app.get("/orders/me", &bob).await.json::<Value>();
    assert_eq!(mine["orders"].as_array().unwrap().len(), 1);
    assert_eq!(mine["orders"][0]["razorpayPaymentId"], "pay_b");
}

#[tokio::test]
async fn admin_views_are_forbidden_to_customers() {
    let app = TestApp::new();
    let alice = app.token("alice");
    let lamp = app.product("Lamp", 1, 3).await;
    let order = app.paid_order(&alice, lamp, "pay_a").await;

    let all = app.get("/orders/all", &alice).await;
    assert_eq!(all.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(&all), "FORBIDDEN");

    let path = format!("/orders/update-status/{}", order["id"].as_str().unwrap());
    let update = app.put(&path, &alice, json!({"status": "Shipped"})).await;
    assert_eq!(update.status_code(), StatusCode::FORBIDDEN);

    let missing = app
        .put(
            "/orders/update-status/00000000-0000-0000-0000-000000000000",
            &app.admin_token(),
            json!({"status": "Shipped"}),
        )
        .await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
}

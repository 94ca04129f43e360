#![allow(clippy::unwrap_used)]

mod common;

use axum::http::StatusCode;
use common::TestApp;
use serde_json::{json, Value};

async fn inbox(app: &TestApp, token: &str) -> Vec<Value> {
    app.get("/notifications/me", token).await.json::<Value>()["notifications"]
        .as_array()
        .unwrap()
        .clone()
}

#[tokio::test]
async fn admin_broadcast_reaches_every_known_user_once() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let alice = app.token("alice");
    let bob = app.token("bob");
    // Users become recipients once they have been seen.
    assert!(inbox(&app, &alice).await.is_empty());
    assert!(inbox(&app, &bob).await.is_empty());

    let sent = app.post("/notifications", &admin, json!({"message": "Diwali sale"})).await;
    assert_eq!(sent.status_code(), StatusCode::CREATED);
    assert_eq!(sent.json::<Value>()["notification"]["message"], "Diwali sale");

    let duplicate = app.post("/notifications", &admin, json!({"message": "Diwali sale"})).await;
    assert_eq!(duplicate.status_code(), StatusCode::CONFLICT);

    app.clock.advance(chrono::Duration::seconds(4));
    let later = app.post("/notifications", &admin, json!({"message": "Last day"})).await;
    assert_eq!(later.status_code(), StatusCode::CREATED);

    let alice_inbox = inbox(&app, &alice).await;
    assert_eq!(alice_inbox.len(), 2);
    assert_eq!(alice_inbox[0]["message"], "Last day");
    assert_eq!(alice_inbox[0]["isRead"], false);
    assert_eq!(inbox(&app, &bob).await.len(), 2);

    let all = app.get("/notifications", &admin).await.json::<Value>();
    assert_eq!(all["notifications"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn marking_read_is_per_owner() {
    let app = TestApp::new();
    let admin = app.admin_token();
    let alice = app.token("alice");
    let bob = app.token("bob");
    inbox(&app, &alice).await;
    inbox(&app, &bob).await;

    app.post("/notifications", &admin, json!({"message": "One"})).await;
    app.clock.advance(chrono::Duration::seconds(5));
    app.post("/notifications", &admin, json!({"message": "Two"})).await;

    let entry = inbox(&app, &alice).await[0]["id"].as_str().unwrap().to_string();
    let stolen = app.put(&format!("/notifications/{entry}/read"), &bob, json!({})).await;
    assert_eq!(stolen.status_code(), StatusCode::FORBIDDEN);

    let read = app.put(&format!("/notifications/{entry}/read"), &alice, json!({})).await;
    assert_eq!(read.status_code(), StatusCode::OK);
    assert_eq!(read.json::<Value>()["notification"]["isRead"], true);

    let rest = app.put("/notifications/me/read", &alice, json!({})).await.json::<Value>();
    assert_eq!(rest["modifiedCount"], 1);
    let again = app.put("/notifications/me/read", &alice, json!({})).await.json::<Value>();
    assert_eq!(again["modifiedCount"], 0);

    assert!(inbox(&app, &bob).await.iter().all(|e| e["isRead"] == false));
}

#[tokio::test]
async fn only_admins_send_and_blank_messages_are_refused() {
    let app = TestApp::new();

    let customer = app.post("/notifications", &app.token("alice"), json!({"message": "hi"})).await;
    assert_eq!(customer.status_code(), StatusCode::FORBIDDEN);

    let blank = app.post("/notifications", &app.admin_token(), json!({"message": "  "})).await;
    assert_eq!(blank.status_code(), StatusCode::BAD_REQUEST);

    let missing = app.put("/notifications/00000000-0000-0000-0000-000000000000/read", &app.token("alice"), json!({})).await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
}

//! Newsletter endpoints.

use crate::auth::RequireAdmin;
use crate::newsletter::{normalize_email, Subscriber};
use crate::server::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use storefront_web::{ClientIp, WebResult};

/// `POST /newsletter/subscribe` body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SubscribeRequest {
    /// Address to subscribe
    pub email: String,
}

/// Subscription acknowledgement.
#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    /// Always true
    pub success: bool,
    /// What happened
    pub message: &'static str,
    /// The new subscriber
    pub subscriber: Subscriber,
}

/// Subscriber list.
#[derive(Debug, Serialize)]
pub struct SubscriberListResponse {
    /// Always true
    pub success: bool,
    /// Newest first
    pub subscribers: Vec<Subscriber>,
}

/// Subscribe an address.
pub async fn subscribe(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    Json(request): Json<SubscribeRequest>,
) -> WebResult<(StatusCode, Json<SubscribeResponse>)> {
    let email = normalize_email(&request.email)?;
    let subscriber = state
        .newsletter
        .subscribe(Subscriber {
            email,
            subscribed_at: state.clock.now(),
        })
        .await?;
    tracing::info!(client_ip = %ip, "Newsletter subscription added");
    Ok((
        StatusCode::CREATED,
        Json(SubscribeResponse {
            success: true,
            message: "Subscribed successfully",
            subscriber,
        }),
    ))
}

/// Every subscriber.
pub async fn subscribers(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> WebResult<Json<SubscriberListResponse>> {
    let subscribers = state.newsletter.all().await?;
    Ok(Json(SubscriberListResponse {
        success: true,
        subscribers,
    }))
}

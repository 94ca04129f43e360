//! Operational endpoints: liveness, readiness and Prometheus metrics.

use super::state::AppState;
use crate::checkout::Checkout;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use storefront_runtime::HealthCheck;
use storefront_web::handlers::health::health_check_with_store;

pub use storefront_web::handlers::health::health_check;

/// Readiness probe.
///
/// Ready while the checkout store accepts actions; 503 once it is shutting
/// down.
pub async fn readiness_check(State(checkout): State<Checkout>) -> (StatusCode, Json<HealthCheck>) {
    health_check_with_store(State(checkout.store())).await
}

/// Prometheus scrape endpoint. 404 when no recorder is installed.
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.as_ref().and_then(|server| server.render()) {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

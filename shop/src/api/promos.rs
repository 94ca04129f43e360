//! Promo endpoints.
//!
//! `POST /apply-promo` answers in its own `{valid, ..}` shape so the promo
//! box can show the message inline; admin endpoints use the usual envelope.

use super::money_from_json;
use crate::auth::RequireAdmin;
use crate::error::ShopError;
use crate::promo::{self, Promo, PromoCode};
use crate::server::state::AppState;
use crate::types::Money;
use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storefront_web::WebResult;

/// How many promos `GET /promos` shows.
const LATEST_PROMOS: usize = 3;

/// `POST /apply-promo` body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApplyPromoRequest {
    /// Code as typed
    pub code: Option<String>,
}

/// `POST /apply-promo` answer.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct ApplyPromoResponse {
    /// Whether the code can be used now
    pub valid: bool,
    /// Discount in major units when valid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<Money>,
    /// Why not, when invalid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApplyPromoResponse {
    fn invalid(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            status,
            Json(Self {
                valid: false,
                discount: None,
                message: Some(message.into()),
            }),
        )
    }
}

/// Check a code and report its discount.
pub async fn apply_promo(
    State(state): State<AppState>,
    Json(request): Json<ApplyPromoRequest>,
) -> WebResult<(StatusCode, Json<ApplyPromoResponse>)> {
    let Some(code) = request.code.as_deref().and_then(PromoCode::parse) else {
        return Ok(ApplyPromoResponse::invalid(StatusCode::BAD_REQUEST, "Promo code required"));
    };

    match promo::validate(state.promos.as_ref(), &code, state.clock.now()).await {
        Ok(discount) => Ok((
            StatusCode::OK,
            Json(ApplyPromoResponse {
                valid: true,
                discount: Some(discount),
                message: None,
            }),
        )),
        Err(ShopError::NotFound(message)) => Ok(ApplyPromoResponse::invalid(StatusCode::NOT_FOUND, message)),
        Err(e @ ShopError::PromoExpired) => Ok(ApplyPromoResponse::invalid(StatusCode::BAD_REQUEST, e.to_string())),
        Err(e) => Err(e.into()),
    }
}

/// `POST /promos` body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreatePromoRequest {
    /// Code, stored upper-cased
    pub code: Option<String>,
    /// Absolute discount in major units
    pub discount: Option<f64>,
    /// Optional expiry
    pub expiry: Option<DateTime<Utc>>,
    /// Defaults to true
    pub active: Option<bool>,
}

/// One promo.
#[derive(Debug, Serialize)]
pub struct PromoResponse {
    /// Always true
    pub success: bool,
    /// The promo
    pub promo: Promo,
}

/// Several promos.
#[derive(Debug, Serialize)]
pub struct PromoListResponse {
    /// Always true
    pub success: bool,
    /// Newest first
    pub promos: Vec<Promo>,
}

/// Create a promo code.
pub async fn create_promo(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(request): Json<CreatePromoRequest>,
) -> WebResult<(StatusCode, Json<PromoResponse>)> {
    let code = request
        .code
        .as_deref()
        .and_then(PromoCode::parse)
        .ok_or_else(|| ShopError::validation("Promo code required"))?;
    let discount = match request.discount {
        Some(amount) => money_from_json(amount, "Discount")?,
        None => return Err(ShopError::validation("Discount is required").into()),
    };

    let promo = state
        .promos
        .create(Promo {
            code,
            discount,
            active: request.active.unwrap_or(true),
            expiry: request.expiry,
            created_at: state.clock.now(),
        })
        .await?;
    tracing::info!(admin = %admin.user_id, code = %promo.code, discount = %promo.discount, "Promo created");
    Ok((
        StatusCode::CREATED,
        Json(PromoResponse {
            success: true,
            promo,
        }),
    ))
}

/// The newest active promos.
pub async fn latest_promos(State(state): State<AppState>) -> WebResult<Json<PromoListResponse>> {
    let promos = state.promos.latest_active(LATEST_PROMOS).await?;
    Ok(Json(PromoListResponse {
        success: true,
        promos,
    }))
}

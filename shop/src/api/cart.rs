//! Cart endpoints: reserve a unit, release a unit, read the cart.
//!
//! - POST /cart/add     `{productId}` → `{success, cart, stock}`
//! - POST /cart/remove  `{productId}` → `{success, cart, stock}`
//! - GET  /cart                        → `{success, cart, total}`

use super::product_id_from_json;
use crate::auth::AuthUser;
use crate::error::ShopError;
use crate::ledger::Reservation;
use crate::server::state::AppState;
use crate::telemetry::names;
use crate::types::{Money, ProductId};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use storefront_web::WebResult;
use tracing::info;

/// Body of the add/remove calls.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CartRequest {
    /// Product, as a number or decimal string
    pub product_id: Option<serde_json::Value>,
}

/// Cart after a reservation change.
#[derive(Debug, Serialize)]
pub struct CartChangeResponse {
    /// Always true
    pub success: bool,
    /// Product id → reserved quantity
    pub cart: BTreeMap<ProductId, u32>,
    /// Units of the product left in stock
    pub stock: u32,
}

impl From<Reservation> for CartChangeResponse {
    fn from(reservation: Reservation) -> Self {
        Self {
            success: true,
            cart: reservation.cart.quantities(),
            stock: reservation.stock,
        }
    }
}

/// The caller's cart.
#[derive(Debug, Serialize)]
pub struct CartResponse {
    /// Always true
    pub success: bool,
    /// Product id → reserved quantity
    pub cart: BTreeMap<ProductId, u32>,
    /// Sum of quantity × unit price over lines whose product still exists
    pub total: Money,
}

/// Reserve one unit for the caller.
pub async fn add_to_cart(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(request): Json<CartRequest>,
) -> WebResult<Json<CartChangeResponse>> {
    let product = product_id_from_json(request.product_id)?;

    match state.ledger.reserve(&identity.user_id, product).await {
        Ok(reservation) => {
            metrics::counter!(names::RESERVATIONS).increment(1);
            info!(user_id = %identity.user_id, product_id = %product, stock = reservation.stock, "Unit reserved");
            Ok(Json(reservation.into()))
        },
        Err(ShopError::OutOfStock) => {
            metrics::counter!(names::OUT_OF_STOCK).increment(1);
            info!(user_id = %identity.user_id, product_id = %product, "Reservation refused, out of stock");
            Err(ShopError::OutOfStock.into())
        },
        Err(e) => Err(e.into()),
    }
}

/// Release one unit of the caller's reservation. Releasing a product the
/// caller does not hold changes nothing.
pub async fn remove_from_cart(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(request): Json<CartRequest>,
) -> WebResult<Json<CartChangeResponse>> {
    let product = product_id_from_json(request.product_id)?;
    let held = state.ledger.cart(&identity.user_id).await?.quantity(product);

    let reservation = state.ledger.release(&identity.user_id, product).await?;
    if reservation.cart.quantity(product) < held {
        metrics::counter!(names::RELEASES).increment(1);
        info!(user_id = %identity.user_id, product_id = %product, stock = reservation.stock, "Unit released");
    }
    Ok(Json(reservation.into()))
}

/// Read the caller's cart and its total.
pub async fn get_cart(State(state): State<AppState>, AuthUser(identity): AuthUser) -> WebResult<Json<CartResponse>> {
    let cart = state.ledger.cart(&identity.user_id).await?;
    let total = state.ledger.cart_total(&identity.user_id).await?;
    Ok(Json(CartResponse {
        success: true,
        cart: cart.quantities(),
        total,
    }))
}

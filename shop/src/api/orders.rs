//! Order endpoints.

use super::uuid_from_path;
use crate::auth::{AuthUser, RequireAdmin};
use crate::error::ShopError;
use crate::orders::Order;
use crate::server::state::AppState;
use crate::types::{OrderId, OrderStatus};
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use storefront_web::WebResult;

/// One order.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    /// Always true
    pub success: bool,
    /// The order
    pub order: Order,
}

/// Several orders, newest first.
#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    /// Always true
    pub success: bool,
    /// The orders
    pub orders: Vec<Order>,
}

/// `PUT /orders/update-status/:id` body.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateStatusRequest {
    /// New status, case-insensitive
    pub status: Option<String>,
}

fn order_id(raw: &str) -> Result<OrderId, ShopError> {
    uuid_from_path(raw, "order").map(OrderId::from_uuid)
}

/// The caller's orders.
pub async fn my_orders(State(state): State<AppState>, AuthUser(identity): AuthUser) -> WebResult<Json<OrderListResponse>> {
    let orders = state.orders.list_for_user(&identity.user_id).await?;
    Ok(Json(OrderListResponse { success: true, orders }))
}

/// One of the caller's orders. Someone else's order is reported missing.
pub async fn get_order(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> WebResult<Json<OrderResponse>> {
    let order = state
        .orders
        .find(order_id(&id)?)
        .await?
        .filter(|order| order.user_id == identity.user_id)
        .ok_or_else(|| ShopError::not_found("Order not found"))?;
    Ok(Json(OrderResponse { success: true, order }))
}

/// Every order.
pub async fn all_orders(State(state): State<AppState>, RequireAdmin(_admin): RequireAdmin) -> WebResult<Json<OrderListResponse>> {
    let orders = state.orders.list_all().await?;
    Ok(Json(OrderListResponse { success: true, orders }))
}

/// Move an order along its lifecycle.
pub async fn update_status(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> WebResult<Json<OrderResponse>> {
    let id = order_id(&id)?;
    let status: OrderStatus = request
        .status
        .as_deref()
        .ok_or_else(|| ShopError::validation("Status is required"))?
        .parse()
        .map_err(|_| ShopError::validation("Invalid status"))?;

    let order = state.orders.update_status(id, status, state.clock.now()).await?;
    tracing::info!(admin = %admin.user_id, order_id = %order.id, status = %order.status, "Order status updated");
    Ok(Json(OrderResponse { success: true, order }))
}

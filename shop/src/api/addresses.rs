//! Address book endpoints. Every call is scoped to the caller.

use super::uuid_from_path;
use crate::addresses::{Address, AddressForm};
use crate::auth::AuthUser;
use crate::error::ShopError;
use crate::server::state::AppState;
use crate::types::AddressId;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use storefront_web::WebResult;

/// One address.
#[derive(Debug, Serialize)]
pub struct AddressResponse {
    /// Always true
    pub success: bool,
    /// The address
    pub address: Address,
}

/// The caller's addresses, default first.
#[derive(Debug, Serialize)]
pub struct AddressListResponse {
    /// Always true
    pub success: bool,
    /// The addresses
    pub addresses: Vec<Address>,
}

/// Deletion acknowledgement.
#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    /// Always true
    pub success: bool,
    /// What happened
    pub message: &'static str,
}

fn address_id(raw: &str) -> Result<AddressId, ShopError> {
    uuid_from_path(raw, "address").map(AddressId::from_uuid)
}

/// Add an address. The first one becomes the default.
pub async fn add_address(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Json(form): Json<AddressForm>,
) -> WebResult<(StatusCode, Json<AddressResponse>)> {
    let make_default = form.is_default.unwrap_or(false);
    let fields = form.into_fields(&state.catalog.default_country)?;
    let address = state
        .addresses
        .add(&identity.user_id, fields, make_default, state.clock.now())
        .await?;
    Ok((StatusCode::CREATED, Json(AddressResponse { success: true, address })))
}

/// Replace an address's fields.
pub async fn update_address(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
    Json(form): Json<AddressForm>,
) -> WebResult<Json<AddressResponse>> {
    let id = address_id(&id)?;
    let make_default = form.is_default.unwrap_or(false);
    let fields = form.into_fields(&state.catalog.default_country)?;
    let address = state
        .addresses
        .update(&identity.user_id, id, fields, make_default)
        .await?;
    Ok(Json(AddressResponse { success: true, address }))
}

/// The caller's addresses.
pub async fn list_addresses(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> WebResult<Json<AddressListResponse>> {
    let addresses = state.addresses.list(&identity.user_id).await?;
    Ok(Json(AddressListResponse { success: true, addresses }))
}

/// Delete an address; a deleted default hands over to the newest remaining.
pub async fn delete_address(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> WebResult<Json<DeletedResponse>> {
    state.addresses.delete(&identity.user_id, address_id(&id)?).await?;
    Ok(Json(DeletedResponse {
        success: true,
        message: "Address deleted",
    }))
}

/// Make an address the default.
pub async fn set_default_address(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(id): Path<String>,
) -> WebResult<Json<AddressResponse>> {
    let address = state
        .addresses
        .set_default(&identity.user_id, address_id(&id)?)
        .await?;
    Ok(Json(AddressResponse { success: true, address }))
}

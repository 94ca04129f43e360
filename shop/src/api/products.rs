//! Catalog endpoints.
//!
//! Just enough catalog to put stock in the ledger and show it back.

use super::{money_from_json, non_blank, product_id_from_path};
use crate::auth::RequireAdmin;
use crate::error::ShopError;
use crate::ledger::{NewProduct, Product};
use crate::server::state::AppState;
use crate::types::Money;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use storefront_web::WebResult;

/// Admin request to list a product.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateProductRequest {
    /// Product name (required)
    pub name: Option<String>,
    /// Image URL
    pub image: Option<String>,
    /// Category
    pub category: Option<String>,
    /// Brand, "Generic" when absent
    pub brand: Option<String>,
    /// Selling price in major units (required)
    pub new_price: Option<f64>,
    /// List price in major units, the selling price when absent
    pub old_price: Option<f64>,
    /// Description
    pub description: Option<String>,
    /// Initial stock, the configured default when absent
    pub stock: Option<u32>,
    /// Whether the product is shown as available
    pub available: Option<bool>,
}

impl CreateProductRequest {
    fn into_new_product(self, default_stock: u32) -> Result<NewProduct, ShopError> {
        let name = non_blank(self.name).ok_or_else(|| ShopError::validation("Product name is required"))?;
        let new_price = match self.new_price {
            Some(price) => money_from_json(price, "new_price")?,
            None => return Err(ShopError::validation("new_price is required")),
        };
        let old_price: Money = match self.old_price {
            Some(price) => money_from_json(price, "old_price")?,
            None => new_price,
        };

        Ok(NewProduct {
            name,
            image: self.image.unwrap_or_default(),
            category: self.category.unwrap_or_default(),
            brand: non_blank(self.brand).unwrap_or_else(|| "Generic".to_string()),
            new_price,
            old_price,
            description: self.description.unwrap_or_default(),
            stock: self.stock.unwrap_or(default_stock),
            available: self.available.unwrap_or(true),
        })
    }
}

/// One product.
#[derive(Debug, Serialize)]
pub struct ProductResponse {
    /// Always true
    pub success: bool,
    /// The product
    pub product: Product,
}

/// The whole catalog.
#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    /// Always true
    pub success: bool,
    /// Products by id
    pub products: Vec<Product>,
}

/// Plain acknowledgement.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    /// Always true
    pub success: bool,
    /// What happened
    pub message: String,
}

/// List a new product. Ids are assigned one past the highest existing id.
pub async fn create_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(request): Json<CreateProductRequest>,
) -> WebResult<(StatusCode, Json<ProductResponse>)> {
    let product = request.into_new_product(state.catalog.default_stock)?;
    let product = state.ledger.add_product(product, state.clock.now()).await?;
    tracing::info!(admin = %admin.user_id, product_id = %product.id, stock = product.stock, "Product listed");
    Ok((
        StatusCode::CREATED,
        Json(ProductResponse {
            success: true,
            product,
        }),
    ))
}

/// Every product.
pub async fn list_products(State(state): State<AppState>) -> WebResult<Json<ProductListResponse>> {
    let products = state.ledger.products().await?;
    Ok(Json(ProductListResponse {
        success: true,
        products,
    }))
}

/// One product by id.
pub async fn get_product(State(state): State<AppState>, Path(id): Path<String>) -> WebResult<Json<ProductResponse>> {
    let id = product_id_from_path(&id)?;
    let product = state
        .ledger
        .product(id)
        .await?
        .ok_or_else(|| ShopError::not_found("Product not found"))?;
    Ok(Json(ProductResponse {
        success: true,
        product,
    }))
}

/// Delist a product. Cart lines pointing at it stop counting toward totals.
pub async fn delete_product(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<String>,
) -> WebResult<Json<MessageResponse>> {
    let id = product_id_from_path(&id)?;
    state.ledger.remove_product(id).await?;
    tracing::info!(admin = %admin.user_id, product_id = %id, "Product removed");
    Ok(Json(MessageResponse {
        success: true,
        message: "Product removed".to_string(),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_optional_fields() {
        let request = CreateProductRequest {
            name: Some(" Lamp ".into()),
            new_price: Some(50.0),
            ..CreateProductRequest::default()
        };
        let product = request.into_new_product(10).unwrap();
        assert_eq!(product.name, "Lamp");
        assert_eq!(product.brand, "Generic");
        assert_eq!(product.stock, 10);
        assert_eq!(product.old_price, Money::from_minor(5_000));
        assert!(product.available);
    }

    #[test]
    fn name_and_price_are_required() {
        assert!(CreateProductRequest::default().into_new_product(10).is_err());
        let negative = CreateProductRequest {
            name: Some("Lamp".into()),
            new_price: Some(-5.0),
            ..CreateProductRequest::default()
        };
        assert!(negative.into_new_product(10).is_err());
    }
}

//! HTTP handlers.
//!
//! Handlers are thin: pull the caller from [`AuthUser`](crate::auth::AuthUser)
//! or [`RequireAdmin`](crate::auth::RequireAdmin), normalize the body, call a
//! repository or the checkout store, and wrap the result in a
//! `{"success": true, ..}` envelope. Failures become
//! [`AppError`](storefront_web::AppError) responses through `?`.

#![allow(clippy::missing_errors_doc)]

pub mod addresses;
pub mod cart;
pub mod newsletter;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod products;
pub mod promos;
pub mod reviews;

use crate::error::{Result, ShopError};
use crate::types::{Money, ProductId};
use serde_json::Value;
use uuid::Uuid;

/// Product id taken from a path segment.
pub(crate) fn product_id_from_path(raw: &str) -> Result<ProductId> {
    raw.parse().map_err(|_| ShopError::validation("Invalid product id"))
}

/// Product id taken from a JSON body, as a number or decimal string.
pub(crate) fn product_id_from_json(value: Option<Value>) -> Result<ProductId> {
    let value = value
        .filter(|v| !v.is_null())
        .ok_or_else(|| ShopError::validation("Product ID required"))?;
    serde_json::from_value(value).map_err(|_| ShopError::validation("Invalid product id"))
}

/// UUID taken from a path segment.
pub(crate) fn uuid_from_path(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ShopError::validation(format!("Invalid {what} id")))
}

/// Amount in major units from a JSON body.
pub(crate) fn money_from_json(amount: f64, field: &str) -> Result<Money> {
    Money::try_from_major(amount)
        .ok_or_else(|| ShopError::validation(format!("{field} must be a non-negative amount")))
}

/// Trimmed, non-empty text or `None`.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn product_ids_from_bodies() {
        assert_eq!(product_id_from_json(Some(json!(7))).unwrap(), ProductId::new(7));
        assert_eq!(product_id_from_json(Some(json!("7"))).unwrap(), ProductId::new(7));
        assert_eq!(
            product_id_from_json(None).unwrap_err(),
            ShopError::validation("Product ID required")
        );
        assert!(product_id_from_json(Some(json!(-1))).is_err());
        assert!(product_id_from_json(Some(json!({"id": 7}))).is_err());
    }

    #[test]
    fn amounts_must_be_finite_and_non_negative() {
        assert_eq!(money_from_json(90.0, "amount").unwrap(), Money::from_minor(9_000));
        assert!(money_from_json(-1.0, "amount").is_err());
        assert!(money_from_json(f64::NAN, "amount").is_err());
    }
}

//! Per-user shipping addresses.
//!
//! A user with at least one address has exactly one default. The first
//! address is always the default, marking another as default unsets the rest,
//! and deleting the default promotes the most recently created survivor.

use crate::error::{Result, ShopError};
use crate::types::{AddressId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryAddressBook;
pub use postgres::PostgresAddressBook;

/// Postal fields of an address, also snapshotted into orders.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressFields {
    /// Recipient
    pub name: String,
    /// Contact number
    pub phone: String,
    /// Street line
    pub street: String,
    /// City
    pub city: String,
    /// State or province
    pub state: String,
    /// Postal code
    pub pincode: String,
    /// Country
    pub country: String,
}

/// Address form as submitted by a client.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AddressForm {
    /// Recipient
    pub name: Option<String>,
    /// Contact number
    pub phone: Option<String>,
    /// Street line
    pub street: Option<String>,
    /// City
    pub city: Option<String>,
    /// State or province
    pub state: Option<String>,
    /// Postal code
    pub pincode: Option<String>,
    /// Country, defaulted when blank
    pub country: Option<String>,
    /// Request to make this the default address
    pub is_default: Option<bool>,
}

impl AddressForm {
    /// Check required fields and apply the default country.
    ///
    /// # Errors
    ///
    /// Returns `Validation` when any of name, phone, street, city, state or
    /// pincode is missing or blank.
    pub fn into_fields(self, default_country: &str) -> Result<AddressFields> {
        fn required(value: Option<String>) -> Result<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ShopError::validation("All fields required"))
        }

        let country = self
            .country
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| default_country.to_string());

        Ok(AddressFields {
            name: required(self.name)?,
            phone: required(self.phone)?,
            street: required(self.street)?,
            city: required(self.city)?,
            state: required(self.state)?,
            pincode: required(self.pincode)?,
            country,
        })
    }
}

/// A stored address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Address id
    pub id: AddressId,
    /// Owner
    pub user_id: UserId,
    /// Postal fields
    #[serde(flatten)]
    pub fields: AddressFields,
    /// The owner's default address
    pub is_default: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Future returned by address book operations.
pub type AddressFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Address persistence. Every operation is scoped to one user; an id owned by
/// someone else behaves as absent.
pub trait AddressBook: Send + Sync {
    /// Add an address. The user's first address is always the default.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn add(
        &self,
        user: &UserId,
        fields: AddressFields,
        make_default: bool,
        now: DateTime<Utc>,
    ) -> AddressFuture<'_, Address>;

    /// Replace an address's fields and default flag. If no default would
    /// remain, the updated address becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the user has no such address.
    fn update(
        &self,
        user: &UserId,
        id: AddressId,
        fields: AddressFields,
        make_default: bool,
    ) -> AddressFuture<'_, Address>;

    /// Default first, then newest first.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn list(&self, user: &UserId) -> AddressFuture<'_, Vec<Address>>;

    /// Delete an address, promoting the newest survivor if it was the default.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the user has no such address.
    fn delete(&self, user: &UserId, id: AddressId) -> AddressFuture<'_, ()>;

    /// Make an address the only default.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the user has no such address.
    fn set_default(&self, user: &UserId, id: AddressId) -> AddressFuture<'_, Address>;
}

pub(crate) fn address_not_found() -> ShopError {
    ShopError::not_found("Address not found")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> AddressForm {
        AddressForm {
            name: Some("Asha".into()),
            phone: Some("9999999999".into()),
            street: Some("1 MG Road".into()),
            city: Some("Bengaluru".into()),
            state: Some("KA".into()),
            pincode: Some("560001".into()),
            country: None,
            is_default: None,
        }
    }

    #[test]
    fn country_defaults_when_blank() {
        let fields = form().into_fields("India");
        assert_eq!(fields.map(|f| f.country), Ok("India".to_string()));
    }

    #[test]
    fn blank_required_field_is_rejected() {
        let mut blank = form();
        blank.city = Some("   ".into());
        assert_eq!(
            blank.into_fields("India"),
            Err(ShopError::validation("All fields required"))
        );

        let mut missing = form();
        missing.pincode = None;
        assert!(missing.into_fields("India").is_err());
    }
}

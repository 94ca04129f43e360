//! Promo codes: lookup, validity window and discount arithmetic.
//!
//! A discount is an absolute amount in the store currency. It is only ever
//! subtracted from a subtotal via [`apply_discount`], which floors at zero.

use crate::error::{Result, ShopError};
use crate::types::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryPromoStore;
pub use postgres::PostgresPromoStore;

/// Normalized promo code: trimmed and upper-cased.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromoCode(String);

impl PromoCode {
    /// Normalize raw user input. Blank input yields `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self(trimmed.to_uppercase()))
    }

    /// The normalized code
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PromoCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored promo.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promo {
    /// Unique normalized code
    pub code: PromoCode,
    /// Amount subtracted from the subtotal
    pub discount: Money,
    /// Inactive promos are never found by lookups
    pub active: bool,
    /// Optional end of the validity window
    pub expiry: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Promo {
    /// True once the expiry instant has been reached
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry.is_some_and(|expiry| expiry <= now)
    }
}

/// Future returned by promo store operations.
pub type PromoFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Promo persistence.
pub trait PromoStore: Send + Sync {
    /// Store a new promo.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when the code already exists.
    fn create(&self, promo: Promo) -> PromoFuture<'_, Promo>;

    /// Find an active promo by exact code.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn find_active(&self, code: &PromoCode) -> PromoFuture<'_, Option<Promo>>;

    /// Newest active promos first, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn latest_active(&self, limit: usize) -> PromoFuture<'_, Vec<Promo>>;
}

/// Resolve a code to its discount.
///
/// # Errors
///
/// `NotFound` when no active promo matches, `PromoExpired` when the matching
/// promo's expiry has passed.
pub async fn validate(store: &dyn PromoStore, code: &PromoCode, now: DateTime<Utc>) -> Result<Money> {
    let promo = store
        .find_active(code)
        .await?
        .ok_or_else(|| ShopError::not_found("Invalid promo code"))?;
    if promo.is_expired(now) {
        return Err(ShopError::PromoExpired);
    }
    Ok(promo.discount)
}

/// `max(subtotal - discount, 0)`
#[must_use]
pub const fn apply_discount(subtotal: Money, discount: Money) -> Money {
    subtotal.saturating_sub(discount)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use storefront_testing::mocks::epoch;

    fn promo(code: &str, discount: u64, expiry: Option<DateTime<Utc>>) -> Promo {
        Promo {
            code: PromoCode::parse(code).unwrap(),
            discount: Money::from_major(discount).unwrap(),
            active: true,
            expiry,
            created_at: epoch(),
        }
    }

    #[test]
    fn codes_are_trimmed_and_upper_cased() {
        assert_eq!(PromoCode::parse("  save10 ").unwrap().as_str(), "SAVE10");
        assert!(PromoCode::parse("   ").is_none());
    }

    #[test]
    fn discount_never_goes_negative() {
        let fifty = Money::from_major(50).unwrap();
        let eighty = Money::from_major(80).unwrap();
        assert_eq!(apply_discount(fifty, eighty), Money::ZERO);
        assert_eq!(
            apply_discount(Money::from_major(100).unwrap(), Money::from_major(10).unwrap()),
            Money::from_major(90).unwrap()
        );
    }

    #[tokio::test]
    async fn validate_returns_the_discount() {
        let store = InMemoryPromoStore::new();
        store.create(promo("save10", 10, None)).await.unwrap();

        let code = PromoCode::parse("Save10").unwrap();
        let discount = validate(&store, &code, epoch()).await.unwrap();
        assert_eq!(discount, Money::from_major(10).unwrap());
    }

    #[tokio::test]
    async fn expired_promos_are_rejected_even_when_active() {
        let store = InMemoryPromoStore::new();
        let yesterday = epoch() - Duration::days(1);
        store.create(promo("OLD", 10, Some(yesterday))).await.unwrap();

        let result = validate(&store, &PromoCode::parse("old").unwrap(), epoch()).await;
        assert_eq!(result, Err(ShopError::PromoExpired));
    }

    #[tokio::test]
    async fn inactive_and_unknown_codes_are_not_found() {
        let store = InMemoryPromoStore::new();
        let mut inactive = promo("OFF", 5, None);
        inactive.active = false;
        store.create(inactive).await.unwrap();

        for code in ["OFF", "MISSING"] {
            let result = validate(&store, &PromoCode::parse(code).unwrap(), epoch()).await;
            assert_eq!(result, Err(ShopError::not_found("Invalid promo code")));
        }
    }
}

//! In-memory promo store.

use super::{Promo, PromoCode, PromoFuture, PromoStore};
use crate::error::ShopError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Promo store backed by a map keyed by normalized code.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPromoStore {
    promos: Arc<Mutex<HashMap<PromoCode, Promo>>>,
}

impl InMemoryPromoStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> ShopError {
    ShopError::Storage("promo lock poisoned".to_string())
}

impl PromoStore for InMemoryPromoStore {
    fn create(&self, promo: Promo) -> PromoFuture<'_, Promo> {
        let promos = Arc::clone(&self.promos);
        Box::pin(async move {
            let mut promos = promos.lock().map_err(|_| poisoned())?;
            if promos.contains_key(&promo.code) {
                return Err(ShopError::conflict("Promo code already exists"));
            }
            promos.insert(promo.code.clone(), promo.clone());
            Ok(promo)
        })
    }

    fn find_active(&self, code: &PromoCode) -> PromoFuture<'_, Option<Promo>> {
        let promos = Arc::clone(&self.promos);
        let code = code.clone();
        Box::pin(async move {
            let promos = promos.lock().map_err(|_| poisoned())?;
            Ok(promos.get(&code).filter(|promo| promo.active).cloned())
        })
    }

    fn latest_active(&self, limit: usize) -> PromoFuture<'_, Vec<Promo>> {
        let promos = Arc::clone(&self.promos);
        Box::pin(async move {
            let promos = promos.lock().map_err(|_| poisoned())?;
            let mut active: Vec<Promo> = promos.values().filter(|p| p.active).cloned().collect();
            active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            active.truncate(limit);
            Ok(active)
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Money;
    use chrono::Duration;
    use storefront_testing::mocks::epoch;

    fn promo(code: &str, minutes: i64) -> Promo {
        Promo {
            code: PromoCode::parse(code).unwrap(),
            discount: Money::from_minor(100),
            active: true,
            expiry: None,
            created_at: epoch() + Duration::minutes(minutes),
        }
    }

    #[tokio::test]
    async fn duplicate_codes_conflict() {
        let store = InMemoryPromoStore::new();
        store.create(promo("A", 0)).await.unwrap();
        assert!(matches!(store.create(promo("a", 1)).await, Err(ShopError::Conflict(_))));
    }

    #[tokio::test]
    async fn latest_active_is_newest_first_and_limited() {
        let store = InMemoryPromoStore::new();
        for (i, code) in ["A", "B", "C", "D"].into_iter().enumerate() {
            store.create(promo(code, i64::try_from(i).unwrap())).await.unwrap();
        }
        let latest: Vec<String> = store
            .latest_active(3)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.code.to_string())
            .collect();
        assert_eq!(latest, vec!["D", "C", "B"]);
    }
}

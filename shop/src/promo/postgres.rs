//! PostgreSQL promo store.

use super::{Promo, PromoCode, PromoFuture, PromoStore};
use crate::db::{is_unique_violation, money_from_db, money_to_db};
use crate::error::{Result, ShopError};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

#[derive(FromRow)]
struct PromoRow {
    code: String,
    discount: i64,
    active: bool,
    expiry: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PromoRow> for Promo {
    type Error = ShopError;

    fn try_from(row: PromoRow) -> Result<Self> {
        let code = PromoCode::parse(&row.code)
            .ok_or_else(|| ShopError::Storage("blank promo code in database".to_string()))?;
        Ok(Self {
            code,
            discount: money_from_db(row.discount)?,
            active: row.active,
            expiry: row.expiry,
            created_at: row.created_at,
        })
    }
}

/// Promo store backed by the `promos` table.
#[derive(Clone)]
pub struct PostgresPromoStore {
    pool: PgPool,
}

impl PostgresPromoStore {
    /// Create a store over an existing pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl PromoStore for PostgresPromoStore {
    fn create(&self, promo: Promo) -> PromoFuture<'_, Promo> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO promos (code, discount, active, expiry, created_at) VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(promo.code.as_str())
            .bind(money_to_db(promo.discount)?)
            .bind(promo.active)
            .bind(promo.expiry)
            .bind(promo.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    ShopError::conflict("Promo code already exists")
                } else {
                    ShopError::storage("create promo", e)
                }
            })?;
            Ok(promo)
        })
    }

    fn find_active(&self, code: &PromoCode) -> PromoFuture<'_, Option<Promo>> {
        let code = code.clone();
        Box::pin(async move {
            let row: Option<PromoRow> = sqlx::query_as(
                "SELECT code, discount, active, expiry, created_at FROM promos WHERE code = $1 AND active",
            )
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ShopError::storage("find promo", e))?;
            row.map(Promo::try_from).transpose()
        })
    }

    fn latest_active(&self, limit: usize) -> PromoFuture<'_, Vec<Promo>> {
        Box::pin(async move {
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let rows: Vec<PromoRow> = sqlx::query_as(
                "SELECT code, discount, active, expiry, created_at FROM promos
                 WHERE active ORDER BY created_at DESC LIMIT $1",
            )
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ShopError::storage("list promos", e))?;
            rows.into_iter().map(Promo::try_from).collect()
        })
    }
}

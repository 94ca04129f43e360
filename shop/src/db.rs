//! PostgreSQL pool setup, migrations and column conversions shared by the
//! `postgres` repositories.

use crate::config::StorageConfig;
use crate::error::{Result, ShopError};
use crate::types::{Money, ProductId};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

/// Open a connection pool sized from configuration.
///
/// # Errors
///
/// Returns `Storage` if `DATABASE_URL` is unset or the database is unreachable.
pub async fn connect(config: &StorageConfig) -> Result<PgPool> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| ShopError::Storage("DATABASE_URL is not set".to_string()))?;

    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .connect(url)
        .await
        .map_err(|e| ShopError::storage("connect to database", e))
}

/// Apply the embedded schema migrations.
///
/// # Errors
///
/// Returns `Storage` if a migration fails.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| ShopError::Storage(format!("Migration failed: {e}")))
}

pub(crate) fn money_to_db(amount: Money) -> Result<i64> {
    i64::try_from(amount.minor()).map_err(|_| ShopError::validation("Amount out of range"))
}

pub(crate) fn money_from_db(minor: i64) -> Result<Money> {
    u64::try_from(minor)
        .map(Money::from_minor)
        .map_err(|_| ShopError::Storage(format!("negative amount in database: {minor}")))
}

pub(crate) fn product_id_from_db(id: i64) -> Result<ProductId> {
    u32::try_from(id)
        .map(ProductId::new)
        .map_err(|_| ShopError::Storage(format!("product id out of range: {id}")))
}

pub(crate) fn count_from_db(value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| ShopError::Storage(format!("count out of range: {value}")))
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_conversions_reject_out_of_range_values() {
        assert!(money_from_db(-1).is_err());
        assert_eq!(money_from_db(9_000).ok(), Some(Money::from_minor(9_000)));
        assert!(product_id_from_db(i64::from(u32::MAX) + 1).is_err());
        assert!(count_from_db(-3).is_err());
        assert!(money_to_db(Money::from_minor(u64::MAX)).is_err());
    }
}

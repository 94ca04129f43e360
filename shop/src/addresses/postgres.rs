//! PostgreSQL address book.
//!
//! Each mutation locks the user's rows with `FOR UPDATE` before touching
//! default flags; the partial unique index on `(user_id) WHERE is_default`
//! backs the one-default rule.

use super::{address_not_found, Address, AddressBook, AddressFields, AddressFuture};
use crate::error::{Result, ShopError};
use crate::types::{AddressId, UserId};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(FromRow)]
struct AddressRow {
    id: Uuid,
    user_id: String,
    name: String,
    phone: String,
    street: String,
    city: String,
    state: String,
    pincode: String,
    country: String,
    is_default: bool,
    created_at: DateTime<Utc>,
}

impl From<AddressRow> for Address {
    fn from(row: AddressRow) -> Self {
        Self {
            id: AddressId::from_uuid(row.id),
            user_id: UserId::new(row.user_id),
            fields: AddressFields {
                name: row.name,
                phone: row.phone,
                street: row.street,
                city: row.city,
                state: row.state,
                pincode: row.pincode,
                country: row.country,
            },
            is_default: row.is_default,
            created_at: row.created_at,
        }
    }
}

const ADDRESS_COLUMNS: &str =
    "id, user_id, name, phone, street, city, state, pincode, country, is_default, created_at";

/// Address book backed by the `addresses` table.
#[derive(Clone)]
pub struct PostgresAddressBook {
    pool: PgPool,
}

impl PostgresAddressBook {
    /// Create an address book over an existing pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin_for(&self, user: &UserId) -> Result<(Transaction<'static, Postgres>, Vec<Uuid>)> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ShopError::storage("begin transaction", e))?;
        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM addresses WHERE user_id = $1 ORDER BY seq FOR UPDATE")
                .bind(user.as_str())
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| ShopError::storage("lock addresses", e))?;
        Ok((tx, ids))
    }

    async fn clear_defaults(tx: &mut Transaction<'static, Postgres>, user: &UserId) -> Result<()> {
        sqlx::query("UPDATE addresses SET is_default = FALSE WHERE user_id = $1 AND is_default")
            .bind(user.as_str())
            .execute(&mut **tx)
            .await
            .map_err(|e| ShopError::storage("clear default address", e))?;
        Ok(())
    }

    async fn fetch(tx: &mut Transaction<'static, Postgres>, id: Uuid) -> Result<Address> {
        let row: AddressRow =
            sqlx::query_as(&format!("SELECT {ADDRESS_COLUMNS} FROM addresses WHERE id = $1"))
                .bind(id)
                .fetch_one(&mut **tx)
                .await
                .map_err(|e| ShopError::storage("load address", e))?;
        Ok(row.into())
    }

    async fn insert(
        &self,
        user: UserId,
        fields: AddressFields,
        make_default: bool,
        now: DateTime<Utc>,
    ) -> Result<Address> {
        let (mut tx, existing) = self.begin_for(&user).await?;
        let is_default = existing.is_empty() || make_default;
        if is_default {
            Self::clear_defaults(&mut tx, &user).await?;
        }

        let row: AddressRow = sqlx::query_as(&format!(
            "INSERT INTO addresses (id, user_id, name, phone, street, city, state, pincode, country, is_default, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user.as_str())
        .bind(&fields.name)
        .bind(&fields.phone)
        .bind(&fields.street)
        .bind(&fields.city)
        .bind(&fields.state)
        .bind(&fields.pincode)
        .bind(&fields.country)
        .bind(is_default)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| ShopError::storage("insert address", e))?;

        tx.commit()
            .await
            .map_err(|e| ShopError::storage("commit address", e))?;
        Ok(row.into())
    }

    async fn replace(
        &self,
        user: UserId,
        id: AddressId,
        fields: AddressFields,
        make_default: bool,
    ) -> Result<Address> {
        let (mut tx, existing) = self.begin_for(&user).await?;
        let id = *id.as_uuid();
        if !existing.contains(&id) {
            return Err(address_not_found());
        }
        if make_default {
            Self::clear_defaults(&mut tx, &user).await?;
        }

        sqlx::query(
            "UPDATE addresses SET name = $2, phone = $3, street = $4, city = $5, state = $6,
             pincode = $7, country = $8, is_default = $9 WHERE id = $1",
        )
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.phone)
        .bind(&fields.street)
        .bind(&fields.city)
        .bind(&fields.state)
        .bind(&fields.pincode)
        .bind(&fields.country)
        .bind(make_default)
        .execute(&mut *tx)
        .await
        .map_err(|e| ShopError::storage("update address", e))?;

        let any_default: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM addresses WHERE user_id = $1 AND is_default)",
        )
        .bind(user.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| ShopError::storage("check default address", e))?;
        if !any_default {
            sqlx::query("UPDATE addresses SET is_default = TRUE WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| ShopError::storage("restore default address", e))?;
        }

        let address = Self::fetch(&mut tx, id).await?;
        tx.commit()
            .await
            .map_err(|e| ShopError::storage("commit address", e))?;
        Ok(address)
    }

    async fn remove(&self, user: UserId, id: AddressId) -> Result<()> {
        let (mut tx, _) = self.begin_for(&user).await?;
        let removed: Option<bool> =
            sqlx::query_scalar("DELETE FROM addresses WHERE id = $1 AND user_id = $2 RETURNING is_default")
                .bind(id.as_uuid())
                .bind(user.as_str())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| ShopError::storage("delete address", e))?;

        match removed {
            None => return Err(address_not_found()),
            Some(true) => {
                sqlx::query(
                    "UPDATE addresses SET is_default = TRUE WHERE id =
                     (SELECT id FROM addresses WHERE user_id = $1 ORDER BY seq DESC LIMIT 1)",
                )
                .bind(user.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| ShopError::storage("promote default address", e))?;
            },
            Some(false) => {},
        }

        tx.commit()
            .await
            .map_err(|e| ShopError::storage("commit address delete", e))
    }

    async fn mark_default(&self, user: UserId, id: AddressId) -> Result<Address> {
        let (mut tx, existing) = self.begin_for(&user).await?;
        let id = *id.as_uuid();
        if !existing.contains(&id) {
            return Err(address_not_found());
        }
        Self::clear_defaults(&mut tx, &user).await?;
        sqlx::query("UPDATE addresses SET is_default = TRUE WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| ShopError::storage("set default address", e))?;

        let address = Self::fetch(&mut tx, id).await?;
        tx.commit()
            .await
            .map_err(|e| ShopError::storage("commit default address", e))?;
        Ok(address)
    }
}

impl AddressBook for PostgresAddressBook {
    fn add(
        &self,
        user: &UserId,
        fields: AddressFields,
        make_default: bool,
        now: DateTime<Utc>,
    ) -> AddressFuture<'_, Address> {
        Box::pin(self.insert(user.clone(), fields, make_default, now))
    }

    fn update(
        &self,
        user: &UserId,
        id: AddressId,
        fields: AddressFields,
        make_default: bool,
    ) -> AddressFuture<'_, Address> {
        Box::pin(self.replace(user.clone(), id, fields, make_default))
    }

    fn list(&self, user: &UserId) -> AddressFuture<'_, Vec<Address>> {
        let user = user.clone();
        Box::pin(async move {
            let rows: Vec<AddressRow> = sqlx::query_as(&format!(
                "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1
                 ORDER BY is_default DESC, seq DESC"
            ))
            .bind(user.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ShopError::storage("list addresses", e))?;
            Ok(rows.into_iter().map(Address::from).collect())
        })
    }

    fn delete(&self, user: &UserId, id: AddressId) -> AddressFuture<'_, ()> {
        Box::pin(self.remove(user.clone(), id))
    }

    fn set_default(&self, user: &UserId, id: AddressId) -> AddressFuture<'_, Address> {
        Box::pin(self.mark_default(user.clone(), id))
    }
}

//! PostgreSQL order repository.
//!
//! Idempotency rests on the unique index over `gateway_payment_id`: commit is
//! `INSERT .. ON CONFLICT DO NOTHING` followed by a read of the winner.

use super::{order_not_found, CommitOutcome, NewOrder, Order, OrderFuture, OrderItem, OrderRepository};
use crate::addresses::AddressFields;
use crate::db::{money_from_db, money_to_db};
use crate::error::{Result, ShopError};
use crate::types::{OrderId, OrderStatus, UserId};
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: String,
    address: Json<AddressFields>,
    items: Json<Vec<OrderItem>>,
    total: i64,
    currency: String,
    gateway_order_id: String,
    gateway_payment_id: String,
    gateway_signature: String,
    status: String,
    cart_cleared: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = ShopError;

    fn try_from(row: OrderRow) -> Result<Self> {
        Ok(Self {
            id: OrderId::from_uuid(row.id),
            user_id: UserId::new(row.user_id),
            address: row.address.0,
            items: row.items.0,
            total: money_from_db(row.total)?,
            currency: row.currency,
            gateway_order_id: row.gateway_order_id,
            gateway_payment_id: row.gateway_payment_id,
            gateway_signature: row.gateway_signature,
            status: row.status.parse().map_err(ShopError::Storage)?,
            cart_cleared: row.cart_cleared,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, user_id, address, items, total, currency, gateway_order_id, \
     gateway_payment_id, gateway_signature, status, cart_cleared, created_at, updated_at";

/// Order repository backed by the `orders` table.
#[derive(Clone)]
pub struct PostgresOrderRepository {
    pool: PgPool,
}

impl PostgresOrderRepository {
    /// Create a repository over an existing pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, new: NewOrder) -> Result<CommitOutcome> {
        let order = new.into_order(OrderId::new());
        let inserted: Option<OrderRow> = sqlx::query_as(&format!(
            "INSERT INTO orders ({ORDER_COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
             ON CONFLICT (gateway_payment_id) DO NOTHING
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_str())
        .bind(Json(&order.address))
        .bind(Json(&order.items))
        .bind(money_to_db(order.total)?)
        .bind(&order.currency)
        .bind(&order.gateway_order_id)
        .bind(&order.gateway_payment_id)
        .bind(&order.gateway_signature)
        .bind(order.status.as_str())
        .bind(order.cart_cleared)
        .bind(order.created_at)
        .bind(order.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ShopError::storage("insert order", e))?;

        if let Some(row) = inserted {
            return Ok(CommitOutcome::Created(row.try_into()?));
        }

        let existing: OrderRow = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE gateway_payment_id = $1"
        ))
        .bind(&order.gateway_payment_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| ShopError::storage("load existing order", e))?;
        Ok(CommitOutcome::Existing(existing.try_into()?))
    }

    async fn set_status(&self, id: OrderId, status: OrderStatus, now: DateTime<Utc>) -> Result<Order> {
        let allowed_from: Vec<&'static str> = status
            .predecessors()
            .into_iter()
            .map(OrderStatus::as_str)
            .collect();

        // updated_at only moves when the status actually changes.
        let updated: Option<OrderRow> = sqlx::query_as(&format!(
            "UPDATE orders
             SET updated_at = CASE WHEN status = $2 THEN updated_at ELSE $3 END, status = $2
             WHERE id = $1 AND status = ANY($4)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(status.as_str())
        .bind(now)
        .bind(&allowed_from)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| ShopError::storage("update order status", e))?;

        if let Some(row) = updated {
            return row.try_into();
        }

        let current: Option<String> = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ShopError::storage("load order status", e))?;
        let from: OrderStatus = current
            .ok_or_else(order_not_found)?
            .parse()
            .map_err(ShopError::Storage)?;
        Err(ShopError::InvalidStatusTransition { from, to: status })
    }

    async fn fetch_many(&self, user: Option<&UserId>) -> Result<Vec<Order>> {
        let rows: Vec<OrderRow> = match user {
            Some(user) => sqlx::query_as(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
            ))
            .bind(user.as_str())
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query_as(&format!(
                "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC"
            ))
            .fetch_all(&self.pool)
            .await,
        }
        .map_err(|e| ShopError::storage("list orders", e))?;
        rows.into_iter().map(Order::try_from).collect()
    }
}

impl OrderRepository for PostgresOrderRepository {
    fn commit(&self, order: NewOrder) -> OrderFuture<'_, CommitOutcome> {
        Box::pin(self.insert(order))
    }

    fn mark_cart_cleared(&self, id: OrderId) -> OrderFuture<'_, ()> {
        Box::pin(async move {
            let result = sqlx::query("UPDATE orders SET cart_cleared = TRUE WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(|e| ShopError::storage("mark cart cleared", e))?;
            if result.rows_affected() == 0 {
                return Err(order_not_found());
            }
            Ok(())
        })
    }

    fn find(&self, id: OrderId) -> OrderFuture<'_, Option<Order>> {
        Box::pin(async move {
            let row: Option<OrderRow> =
                sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                    .bind(id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| ShopError::storage("get order", e))?;
            row.map(Order::try_from).transpose()
        })
    }

    fn list_for_user(&self, user: &UserId) -> OrderFuture<'_, Vec<Order>> {
        let user = user.clone();
        Box::pin(async move { self.fetch_many(Some(&user)).await })
    }

    fn list_all(&self) -> OrderFuture<'_, Vec<Order>> {
        Box::pin(self.fetch_many(None))
    }

    fn update_status(&self, id: OrderId, status: OrderStatus, now: DateTime<Utc>) -> OrderFuture<'_, Order> {
        Box::pin(self.set_status(id, status, now))
    }
}

//! PostgreSQL inventory ledger.
//!
//! Reserve runs in one transaction whose first statement is a conditional
//! decrement, so two sessions racing for the last unit serialize on the
//! product row and the loser sees zero rows updated.

use super::{Cart, CartLine, InventoryLedger, LedgerFuture, NewProduct, Product, Reservation};
use crate::db::{count_from_db, money_from_db, money_to_db, product_id_from_db};
use crate::error::{Result, ShopError};
use crate::types::{Money, OrderId, ProductId, UserId};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};

#[derive(FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    image: String,
    category: String,
    brand: String,
    new_price: i64,
    old_price: i64,
    description: String,
    stock: i64,
    available: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = ShopError;

    fn try_from(row: ProductRow) -> Result<Self> {
        Ok(Self {
            id: product_id_from_db(row.id)?,
            name: row.name,
            image: row.image,
            category: row.category,
            brand: row.brand,
            new_price: money_from_db(row.new_price)?,
            old_price: money_from_db(row.old_price)?,
            description: row.description,
            stock: count_from_db(row.stock)?,
            available: row.available,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct CartLineRow {
    product_id: i64,
    quantity: i64,
    unit_price: i64,
}

const PRODUCT_COLUMNS: &str =
    "id, name, image, category, brand, new_price, old_price, description, stock, available, created_at";

/// Ledger backed by the `products` and `cart_lines` tables.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Create a ledger over an existing pool
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_cart<'e, E>(executor: E, user: &UserId) -> Result<Cart>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let rows: Vec<CartLineRow> = sqlx::query_as(
            "SELECT product_id, quantity, unit_price FROM cart_lines WHERE user_id = $1",
        )
        .bind(user.as_str())
        .fetch_all(executor)
        .await
        .map_err(|e| ShopError::storage("load cart", e))?;

        let lines = rows
            .into_iter()
            .map(|row| {
                Ok((
                    product_id_from_db(row.product_id)?,
                    CartLine {
                        quantity: count_from_db(row.quantity)?,
                        unit_price: money_from_db(row.unit_price)?,
                    },
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Cart::from_lines(lines))
    }

    async fn product_exists(tx: &mut Transaction<'_, Postgres>, id: ProductId) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)")
            .bind(i64::from(id.value()))
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| ShopError::storage("check product", e))
    }

    async fn reserve_unit(&self, user: UserId, product: ProductId) -> Result<Reservation> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ShopError::storage("begin transaction", e))?;

        let decremented: Option<(i64, i64)> = sqlx::query_as(
            "UPDATE products SET stock = stock - 1 WHERE id = $1 AND stock > 0 RETURNING stock, new_price",
        )
        .bind(i64::from(product.value()))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| ShopError::storage("reserve stock", e))?;

        let Some((stock, price)) = decremented else {
            let exists = Self::product_exists(&mut tx, product).await?;
            return Err(if exists {
                ShopError::OutOfStock
            } else {
                ShopError::not_found("Product not found")
            });
        };

        sqlx::query(
            "INSERT INTO cart_lines (user_id, product_id, quantity, unit_price) VALUES ($1, $2, 1, $3)
             ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = cart_lines.quantity + 1",
        )
        .bind(user.as_str())
        .bind(i64::from(product.value()))
        .bind(price)
        .execute(&mut *tx)
        .await
        .map_err(|e| ShopError::storage("add cart line", e))?;

        let cart = Self::load_cart(&mut *tx, &user).await?;
        tx.commit()
            .await
            .map_err(|e| ShopError::storage("commit reservation", e))?;

        Ok(Reservation {
            stock: count_from_db(stock)?,
            cart,
        })
    }

    async fn release_unit(&self, user: UserId, product: ProductId) -> Result<Reservation> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ShopError::storage("begin transaction", e))?;

        // Lock the product row first so reserve and release on it serialize.
        let current: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1 FOR UPDATE")
            .bind(i64::from(product.value()))
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| ShopError::storage("lock product", e))?;
        let Some(mut stock) = current else {
            return Err(ShopError::not_found("Product not found"));
        };

        let remaining: Option<i64> = sqlx::query_scalar(
            "UPDATE cart_lines SET quantity = quantity - 1
             WHERE user_id = $1 AND product_id = $2 AND quantity > 0
             RETURNING quantity",
        )
        .bind(user.as_str())
        .bind(i64::from(product.value()))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| ShopError::storage("release cart line", e))?;

        if let Some(remaining) = remaining {
            if remaining == 0 {
                sqlx::query("DELETE FROM cart_lines WHERE user_id = $1 AND product_id = $2")
                    .bind(user.as_str())
                    .bind(i64::from(product.value()))
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| ShopError::storage("drop cart line", e))?;
            }
            stock = sqlx::query_scalar("UPDATE products SET stock = stock + 1 WHERE id = $1 RETURNING stock")
                .bind(i64::from(product.value()))
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| ShopError::storage("restock product", e))?;
        }

        let cart = Self::load_cart(&mut *tx, &user).await?;
        tx.commit()
            .await
            .map_err(|e| ShopError::storage("commit release", e))?;

        Ok(Reservation {
            stock: count_from_db(stock)?,
            cart,
        })
    }

    async fn insert_product(&self, product: NewProduct, created_at: DateTime<Utc>) -> Result<Product> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ShopError::storage("begin transaction", e))?;

        // Serializes id assignment between concurrent inserts.
        sqlx::query("LOCK TABLE products IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await
            .map_err(|e| ShopError::storage("lock products", e))?;

        let row: ProductRow = sqlx::query_as(&format!(
            "INSERT INTO products (id, name, image, category, brand, new_price, old_price, description, stock, available, created_at)
             VALUES ((SELECT COALESCE(MAX(id), 0) + 1 FROM products), $1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(&product.name)
        .bind(&product.image)
        .bind(&product.category)
        .bind(&product.brand)
        .bind(money_to_db(product.new_price)?)
        .bind(money_to_db(product.old_price)?)
        .bind(&product.description)
        .bind(i64::from(product.stock))
        .bind(product.available)
        .bind(created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| ShopError::storage("insert product", e))?;

        tx.commit()
            .await
            .map_err(|e| ShopError::storage("commit product", e))?;
        row.try_into()
    }
}

impl InventoryLedger for PostgresLedger {
    fn add_product(&self, product: NewProduct, created_at: DateTime<Utc>) -> LedgerFuture<'_, Product> {
        Box::pin(self.insert_product(product, created_at))
    }

    fn product(&self, id: ProductId) -> LedgerFuture<'_, Option<Product>> {
        Box::pin(async move {
            let row: Option<ProductRow> =
                sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
                    .bind(i64::from(id.value()))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| ShopError::storage("get product", e))?;
            row.map(Product::try_from).transpose()
        })
    }

    fn products(&self) -> LedgerFuture<'_, Vec<Product>> {
        Box::pin(async move {
            let rows: Vec<ProductRow> =
                sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id"))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(|e| ShopError::storage("list products", e))?;
            rows.into_iter().map(Product::try_from).collect()
        })
    }

    fn remove_product(&self, id: ProductId) -> LedgerFuture<'_, ()> {
        Box::pin(async move {
            let result = sqlx::query("DELETE FROM products WHERE id = $1")
                .bind(i64::from(id.value()))
                .execute(&self.pool)
                .await
                .map_err(|e| ShopError::storage("delete product", e))?;
            if result.rows_affected() == 0 {
                return Err(ShopError::not_found("Product not found"));
            }
            Ok(())
        })
    }

    fn reserve(&self, user: &UserId, product: ProductId) -> LedgerFuture<'_, Reservation> {
        Box::pin(self.reserve_unit(user.clone(), product))
    }

    fn release(&self, user: &UserId, product: ProductId) -> LedgerFuture<'_, Reservation> {
        Box::pin(self.release_unit(user.clone(), product))
    }

    fn cart(&self, user: &UserId) -> LedgerFuture<'_, Cart> {
        let user = user.clone();
        Box::pin(async move { Self::load_cart(&self.pool, &user).await })
    }

    fn clear_cart(&self, user: &UserId, order: OrderId) -> LedgerFuture<'_, bool> {
        let user = user.clone();
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| ShopError::storage("begin cart clear", e))?;

            let recorded = sqlx::query(
                "INSERT INTO cart_clears (order_id, user_id) VALUES ($1, $2)
                 ON CONFLICT (order_id) DO NOTHING",
            )
            .bind(order.as_uuid())
            .bind(user.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| ShopError::storage("record cart clear", e))?;
            if recorded.rows_affected() == 0 {
                return Ok(false);
            }

            sqlx::query("DELETE FROM cart_lines WHERE user_id = $1")
                .bind(user.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| ShopError::storage("clear cart", e))?;
            tx.commit()
                .await
                .map_err(|e| ShopError::storage("commit cart clear", e))?;
            Ok(true)
        })
    }

    fn cart_total(&self, user: &UserId) -> LedgerFuture<'_, Money> {
        let user = user.clone();
        Box::pin(async move {
            let total: Option<i64> = sqlx::query_scalar(
                "SELECT SUM(c.quantity * c.unit_price)::BIGINT
                 FROM cart_lines c JOIN products p ON p.id = c.product_id
                 WHERE c.user_id = $1",
            )
            .bind(user.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ShopError::storage("compute cart total", e))?;
            total.map_or(Ok(Money::ZERO), money_from_db)
        })
    }
}

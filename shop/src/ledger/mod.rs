//! Stock ledger and cart store.
//!
//! Product stock and per-user carts are one component: every unit that leaves
//! a product's `stock` lands in exactly one cart line, and every unit released
//! from a cart goes back to `stock`. For every product,
//!
//! ```text
//! stock + Σ(cart quantities across users) == stock ceiling
//! ```
//!
//! holds across any sequence of [`InventoryLedger::reserve`] and
//! [`InventoryLedger::release`] calls. [`InventoryLedger::clear_cart`] is the one
//! operation that drops units without restocking them: it runs after a paid
//! order has consumed them, at most once per order.

use crate::error::Result;
use crate::types::{Money, OrderId, ProductId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryLedger;
pub use postgres::PostgresLedger;

/// Future returned by ledger operations.
pub type LedgerFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// A catalog product.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Stable integer id
    pub id: ProductId,
    /// Display name
    pub name: String,
    /// Image URL
    pub image: String,
    /// Category slug
    pub category: String,
    /// Brand name
    pub brand: String,
    /// Current selling price
    pub new_price: Money,
    /// Reference ("was") price
    pub old_price: Money,
    /// Long description
    pub description: String,
    /// Units available to reserve
    pub stock: u32,
    /// Listed in the storefront
    pub available: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Fields for a new product. Defaults are applied by the caller.
#[derive(Clone, Debug)]
pub struct NewProduct {
    /// Display name
    pub name: String,
    /// Image URL
    pub image: String,
    /// Category slug
    pub category: String,
    /// Brand name
    pub brand: String,
    /// Current selling price
    pub new_price: Money,
    /// Reference price
    pub old_price: Money,
    /// Long description
    pub description: String,
    /// Initial stock
    pub stock: u32,
    /// Listed in the storefront
    pub available: bool,
}

/// One product's entry in a cart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Reserved units, always at least 1
    pub quantity: u32,
    /// Price frozen when the line was created
    pub unit_price: Money,
}

/// A user's reservations.
///
/// A product with no line has quantity 0.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: BTreeMap<ProductId, CartLine>,
}

impl Cart {
    /// Build a cart from its lines, dropping zero-quantity lines
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = (ProductId, CartLine)>) -> Self {
        Self {
            lines: lines
                .into_iter()
                .filter(|(_, line)| line.quantity > 0)
                .collect(),
        }
    }

    /// Reserved quantity of a product
    #[must_use]
    pub fn quantity(&self, product: ProductId) -> u32 {
        self.lines.get(&product).map_or(0, |line| line.quantity)
    }

    /// The product id → quantity mapping shown to clients
    #[must_use]
    pub fn quantities(&self) -> BTreeMap<ProductId, u32> {
        self.lines
            .iter()
            .map(|(id, line)| (*id, line.quantity))
            .collect()
    }

    /// Iterate over lines
    pub fn lines(&self) -> impl Iterator<Item = (ProductId, &CartLine)> {
        self.lines.iter().map(|(id, line)| (*id, line))
    }

    /// True when nothing is reserved
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add one unit, freezing `unit_price` if the line is new.
    pub(crate) fn add_unit(&mut self, product: ProductId, unit_price: Money) {
        self.lines
            .entry(product)
            .and_modify(|line| line.quantity += 1)
            .or_insert(CartLine {
                quantity: 1,
                unit_price,
            });
    }

    /// Remove one unit. Returns false when the product had no units.
    pub(crate) fn remove_unit(&mut self, product: ProductId) -> bool {
        let Some(line) = self.lines.get_mut(&product) else {
            return false;
        };
        line.quantity -= 1;
        if line.quantity == 0 {
            self.lines.remove(&product);
        }
        true
    }

    /// Sum of `quantity × frozen price` over lines whose product passes `exists`.
    #[must_use]
    pub fn total_where(&self, exists: impl Fn(ProductId) -> bool) -> Money {
        self.lines
            .iter()
            .filter(|(id, _)| exists(**id))
            .filter_map(|(_, line)| line.unit_price.checked_multiply(line.quantity))
            .fold(Money::ZERO, |acc, amount| {
                acc.checked_add(amount).unwrap_or(acc)
            })
    }
}

/// Outcome of a reserve or release: the product's stock and the user's cart
/// right after the operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reservation {
    /// Product stock after the operation
    pub stock: u32,
    /// The caller's cart after the operation
    pub cart: Cart,
}

/// Product stock and user carts, mutated together.
///
/// Implementations must make `reserve` and `release` atomic per call: the
/// stock check, the stock change and the cart change happen as one unit, so
/// concurrent reservations of the last unit cannot both succeed.
pub trait InventoryLedger: Send + Sync {
    /// Add a product with the next free id (`max(id) + 1`).
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn add_product(&self, product: NewProduct, created_at: DateTime<Utc>) -> LedgerFuture<'_, Product>;

    /// Look up one product.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn product(&self, id: ProductId) -> LedgerFuture<'_, Option<Product>>;

    /// All products, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn products(&self) -> LedgerFuture<'_, Vec<Product>>;

    /// Delete a product. Cart lines pointing at it stay and are skipped by
    /// totals.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the product does not exist.
    fn remove_product(&self, id: ProductId) -> LedgerFuture<'_, ()>;

    /// Move one unit from the product's stock into the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown product and `OutOfStock` when stock
    /// is 0. Nothing changes on error.
    fn reserve(&self, user: &UserId, product: ProductId) -> LedgerFuture<'_, Reservation>;

    /// Move one unit from the user's cart back to stock. A product the user
    /// holds no units of is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown product.
    fn release(&self, user: &UserId, product: ProductId) -> LedgerFuture<'_, Reservation>;

    /// The user's cart.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn cart(&self, user: &UserId) -> LedgerFuture<'_, Cart>;

    /// Empty the user's cart without restocking, once for `order`.
    ///
    /// The clear and the record that `order` performed it are one atomic
    /// step. Returns `false`, leaving the cart untouched, when `order` has
    /// already cleared it; units reserved since then stay reserved.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn clear_cart(&self, user: &UserId, order: OrderId) -> LedgerFuture<'_, bool>;

    /// `Σ quantity × frozen unit price` over lines whose product still exists.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn cart_total(&self, user: &UserId) -> LedgerFuture<'_, Money>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: u32, minor: u64) -> CartLine {
        CartLine {
            quantity,
            unit_price: Money::from_minor(minor),
        }
    }

    #[test]
    fn zero_quantity_lines_are_absent() {
        let cart = Cart::from_lines([(ProductId::new(1), line(0, 100)), (ProductId::new(2), line(2, 100))]);
        assert_eq!(cart.quantity(ProductId::new(1)), 0);
        assert_eq!(cart.quantities().len(), 1);
    }

    #[test]
    fn add_unit_keeps_first_price() {
        let mut cart = Cart::default();
        cart.add_unit(ProductId::new(1), Money::from_minor(500));
        cart.add_unit(ProductId::new(1), Money::from_minor(900));
        assert_eq!(cart.quantity(ProductId::new(1)), 2);
        assert_eq!(cart.total_where(|_| true), Money::from_minor(1_000));
    }

    #[test]
    fn remove_unit_drops_empty_line() {
        let mut cart = Cart::default();
        cart.add_unit(ProductId::new(3), Money::from_minor(500));
        assert!(cart.remove_unit(ProductId::new(3)));
        assert!(cart.is_empty());
        assert!(!cart.remove_unit(ProductId::new(3)));
    }

    #[test]
    fn total_skips_missing_products() {
        let cart = Cart::from_lines([(ProductId::new(1), line(2, 1_000)), (ProductId::new(2), line(1, 700))]);
        let total = cart.total_where(|id| id == ProductId::new(1));
        assert_eq!(total, Money::from_minor(2_000));
    }

    #[test]
    fn quantities_serialize_with_id_keys() {
        let cart = Cart::from_lines([(ProductId::new(1), line(2, 1_000))]);
        let json = serde_json::to_value(cart.quantities()).unwrap_or_default();
        assert_eq!(json, serde_json::json!({ "1": 2 }));
    }
}

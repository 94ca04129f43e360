//! In-memory inventory ledger.
//!
//! Catalog and carts sit behind a single mutex so a reservation checks and
//! moves stock and cart quantity in one critical section.

use super::{Cart, InventoryLedger, LedgerFuture, NewProduct, Product, Reservation};
use crate::error::ShopError;
use crate::types::{Money, OrderId, ProductId, UserId};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct LedgerState {
    products: BTreeMap<ProductId, Product>,
    carts: HashMap<UserId, Cart>,
    cleared_by: HashSet<OrderId>,
}

impl LedgerState {
    fn cart(&self, user: &UserId) -> Cart {
        self.carts.get(user).cloned().unwrap_or_default()
    }
}

/// Ledger backed by process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedger {
    /// Create an empty ledger
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty ledger wrapped for sharing
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

fn poisoned() -> ShopError {
    ShopError::Storage("ledger lock poisoned".to_string())
}

impl InventoryLedger for InMemoryLedger {
    fn add_product(&self, product: NewProduct, created_at: DateTime<Utc>) -> LedgerFuture<'_, Product> {
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            let mut state = state.lock().map_err(|_| poisoned())?;
            let id = match state.products.keys().next_back() {
                Some(last) => last
                    .next()
                    .ok_or_else(|| ShopError::Storage("product id space exhausted".to_string()))?,
                None => ProductId::new(1),
            };
            let product = Product {
                id,
                name: product.name,
                image: product.image,
                category: product.category,
                brand: product.brand,
                new_price: product.new_price,
                old_price: product.old_price,
                description: product.description,
                stock: product.stock,
                available: product.available,
                created_at,
            };
            state.products.insert(id, product.clone());
            Ok(product)
        })
    }

    fn product(&self, id: ProductId) -> LedgerFuture<'_, Option<Product>> {
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            let state = state.lock().map_err(|_| poisoned())?;
            Ok(state.products.get(&id).cloned())
        })
    }

    fn products(&self) -> LedgerFuture<'_, Vec<Product>> {
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            let state = state.lock().map_err(|_| poisoned())?;
            Ok(state.products.values().cloned().collect())
        })
    }

    fn remove_product(&self, id: ProductId) -> LedgerFuture<'_, ()> {
        let state = Arc::clone(&self.state);
        Box::pin(async move {
            let mut state = state.lock().map_err(|_| poisoned())?;
            state
                .products
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| ShopError::not_found("Product not found"))
        })
    }

    fn reserve(&self, user: &UserId, product: ProductId) -> LedgerFuture<'_, Reservation> {
        let state = Arc::clone(&self.state);
        let user = user.clone();
        Box::pin(async move {
            let mut state = state.lock().map_err(|_| poisoned())?;
            let entry = state
                .products
                .get_mut(&product)
                .ok_or_else(|| ShopError::not_found("Product not found"))?;
            if entry.stock == 0 {
                return Err(ShopError::OutOfStock);
            }
            entry.stock -= 1;
            let stock = entry.stock;
            let price = entry.new_price;

            let cart = state.carts.entry(user).or_default();
            cart.add_unit(product, price);
            Ok(Reservation {
                stock,
                cart: cart.clone(),
            })
        })
    }

    fn release(&self, user: &UserId, product: ProductId) -> LedgerFuture<'_, Reservation> {
        let state = Arc::clone(&self.state);
        let user = user.clone();
        Box::pin(async move {
            let mut state = state.lock().map_err(|_| poisoned())?;
            let LedgerState { products, carts, .. } = &mut *state;
            let entry = products
                .get_mut(&product)
                .ok_or_else(|| ShopError::not_found("Product not found"))?;

            let released = carts
                .get_mut(&user)
                .is_some_and(|cart| cart.remove_unit(product));
            if released {
                entry.stock += 1;
            }
            let stock = entry.stock;
            Ok(Reservation {
                stock,
                cart: state.cart(&user),
            })
        })
    }

    fn cart(&self, user: &UserId) -> LedgerFuture<'_, Cart> {
        let state = Arc::clone(&self.state);
        let user = user.clone();
        Box::pin(async move {
            let state = state.lock().map_err(|_| poisoned())?;
            Ok(state.cart(&user))
        })
    }

    fn clear_cart(&self, user: &UserId, order: OrderId) -> LedgerFuture<'_, bool> {
        let state = Arc::clone(&self.state);
        let user = user.clone();
        Box::pin(async move {
            let mut state = state.lock().map_err(|_| poisoned())?;
            if !state.cleared_by.insert(order) {
                return Ok(false);
            }
            state.carts.remove(&user);
            Ok(true)
        })
    }

    fn cart_total(&self, user: &UserId) -> LedgerFuture<'_, Money> {
        let state = Arc::clone(&self.state);
        let user = user.clone();
        Box::pin(async move {
            let state = state.lock().map_err(|_| poisoned())?;
            Ok(state
                .cart(&user)
                .total_where(|id| state.products.contains_key(&id)))
        })
    }
}

//! In-memory order repository.

use super::{order_not_found, transition, CommitOutcome, NewOrder, Order, OrderFuture, OrderRepository};
use crate::error::ShopError;
use crate::types::{OrderId, OrderStatus, UserId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct OrderTable {
    // Insertion order doubles as commit order.
    rows: Vec<Order>,
    by_payment: HashMap<String, usize>,
}

impl OrderTable {
    fn newest_first(&self, keep: impl Fn(&Order) -> bool) -> Vec<Order> {
        let mut orders: Vec<Order> = self.rows.iter().rev().filter(|o| keep(o)).cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    fn get_mut(&mut self, id: OrderId) -> Option<&mut Order> {
        self.rows.iter_mut().find(|o| o.id == id)
    }
}

/// Order repository backed by process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderRepository {
    table: Arc<Mutex<OrderTable>>,
}

impl InMemoryOrderRepository {
    /// Create an empty repository
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> ShopError {
    ShopError::Storage("order lock poisoned".to_string())
}

impl OrderRepository for InMemoryOrderRepository {
    fn commit(&self, order: NewOrder) -> OrderFuture<'_, CommitOutcome> {
        let table = Arc::clone(&self.table);
        Box::pin(async move {
            let mut table = table.lock().map_err(|_| poisoned())?;
            if let Some(&index) = table.by_payment.get(&order.gateway_payment_id) {
                return Ok(CommitOutcome::Existing(table.rows[index].clone()));
            }
            let order = order.into_order(OrderId::new());
            let index = table.rows.len();
            table.by_payment.insert(order.gateway_payment_id.clone(), index);
            table.rows.push(order.clone());
            Ok(CommitOutcome::Created(order))
        })
    }

    fn mark_cart_cleared(&self, id: OrderId) -> OrderFuture<'_, ()> {
        let table = Arc::clone(&self.table);
        Box::pin(async move {
            let mut table = table.lock().map_err(|_| poisoned())?;
            let order = table.get_mut(id).ok_or_else(order_not_found)?;
            order.cart_cleared = true;
            Ok(())
        })
    }

    fn find(&self, id: OrderId) -> OrderFuture<'_, Option<Order>> {
        let table = Arc::clone(&self.table);
        Box::pin(async move {
            let table = table.lock().map_err(|_| poisoned())?;
            Ok(table.rows.iter().find(|o| o.id == id).cloned())
        })
    }

    fn list_for_user(&self, user: &UserId) -> OrderFuture<'_, Vec<Order>> {
        let table = Arc::clone(&self.table);
        let user = user.clone();
        Box::pin(async move {
            let table = table.lock().map_err(|_| poisoned())?;
            Ok(table.newest_first(move |o| o.user_id == user))
        })
    }

    fn list_all(&self) -> OrderFuture<'_, Vec<Order>> {
        let table = Arc::clone(&self.table);
        Box::pin(async move {
            let table = table.lock().map_err(|_| poisoned())?;
            Ok(table.newest_first(|_| true))
        })
    }

    fn update_status(&self, id: OrderId, status: OrderStatus, now: DateTime<Utc>) -> OrderFuture<'_, Order> {
        let table = Arc::clone(&self.table);
        Box::pin(async move {
            let mut table = table.lock().map_err(|_| poisoned())?;
            let order = table.get_mut(id).ok_or_else(order_not_found)?;
            transition(order, status, now)?;
            Ok(order.clone())
        })
    }
}

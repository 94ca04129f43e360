//! Committed orders.
//!
//! An order is written once per gateway payment id and never rewritten
//! except for its status (admin lifecycle) and the internal cart-cleared
//! marker used to finish an interrupted commit.

use crate::addresses::AddressFields;
use crate::error::{Result, ShopError};
use crate::types::{Money, OrderId, OrderStatus, ProductId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryOrderRepository;
pub use postgres::PostgresOrderRepository;

/// Immutable line item captured at order time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Product id at purchase time
    pub id: ProductId,
    /// Product name at purchase time
    #[serde(default)]
    pub name: String,
    /// Unit price paid
    pub price: Money,
    /// Units bought
    pub quantity: u32,
    /// Image URL at purchase time
    #[serde(default)]
    pub image: String,
}

/// A committed order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Order id
    pub id: OrderId,
    /// Buyer
    pub user_id: UserId,
    /// Shipping address snapshot
    pub address: AddressFields,
    /// Line item snapshot
    pub items: Vec<OrderItem>,
    /// Amount paid
    pub total: Money,
    /// ISO currency code
    pub currency: String,
    /// Gateway order the payment was made against
    #[serde(rename = "razorpayOrderId")]
    pub gateway_order_id: String,
    /// Gateway payment id, unique across orders
    #[serde(rename = "razorpayPaymentId")]
    pub gateway_payment_id: String,
    /// Signature that authorized the commit
    #[serde(skip)]
    pub gateway_signature: String,
    /// Lifecycle status
    pub status: OrderStatus,
    /// Whether the buyer's cart has been cleared for this order
    #[serde(skip)]
    pub cart_cleared: bool,
    /// Commit time
    pub created_at: DateTime<Utc>,
    /// Last status change
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to commit an order.
#[derive(Clone, Debug)]
pub struct NewOrder {
    /// Buyer
    pub user_id: UserId,
    /// Shipping address snapshot
    pub address: AddressFields,
    /// Line item snapshot
    pub items: Vec<OrderItem>,
    /// Amount paid
    pub total: Money,
    /// ISO currency code
    pub currency: String,
    /// Gateway order id
    pub gateway_order_id: String,
    /// Gateway payment id
    pub gateway_payment_id: String,
    /// Verified signature
    pub gateway_signature: String,
    /// Commit time
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    /// Materialize the order row with status `Paid`.
    #[must_use]
    pub fn into_order(self, id: OrderId) -> Order {
        Order {
            id,
            user_id: self.user_id,
            address: self.address,
            items: self.items,
            total: self.total,
            currency: self.currency,
            gateway_order_id: self.gateway_order_id,
            gateway_payment_id: self.gateway_payment_id,
            gateway_signature: self.gateway_signature,
            status: OrderStatus::Paid,
            cart_cleared: false,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// Result of [`OrderRepository::commit`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommitOutcome {
    /// A new order was written
    Created(Order),
    /// An order with the same gateway payment id already existed
    Existing(Order),
}

impl CommitOutcome {
    /// The stored order, new or existing
    #[must_use]
    pub fn into_order(self) -> Order {
        match self {
            Self::Created(order) | Self::Existing(order) => order,
        }
    }
}

/// Future returned by order repository operations.
pub type OrderFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Order persistence.
pub trait OrderRepository: Send + Sync {
    /// Insert an order unless one exists for the same gateway payment id.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn commit(&self, order: NewOrder) -> OrderFuture<'_, CommitOutcome>;

    /// Record that the buyer's cart was cleared for this order.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the order does not exist.
    fn mark_cart_cleared(&self, id: OrderId) -> OrderFuture<'_, ()>;

    /// Look up one order.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn find(&self, id: OrderId) -> OrderFuture<'_, Option<Order>>;

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn list_for_user(&self, user: &UserId) -> OrderFuture<'_, Vec<Order>>;

    /// Every order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Storage` on backend failure.
    fn list_all(&self) -> OrderFuture<'_, Vec<Order>>;

    /// Move an order to `status` if the lifecycle allows it.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown order and `InvalidStatusTransition`
    /// when the move is not allowed.
    fn update_status(&self, id: OrderId, status: OrderStatus, now: DateTime<Utc>) -> OrderFuture<'_, Order>;
}

pub(crate) fn order_not_found() -> ShopError {
    ShopError::not_found("Order not found")
}

/// Apply a guarded status change to an in-memory order.
pub(crate) fn transition(order: &mut Order, status: OrderStatus, now: DateTime<Utc>) -> Result<()> {
    if !order.status.can_transition_to(status) {
        return Err(ShopError::InvalidStatusTransition {
            from: order.status,
            to: status,
        });
    }
    if order.status != status {
        order.status = status;
        order.updated_at = now;
    }
    Ok(())
}

//! Storefront error taxonomy and its HTTP mapping.

use crate::types::{OrderId, OrderStatus};
use axum::http::StatusCode;
use storefront_runtime::StoreError;
use storefront_web::AppError;
use thiserror::Error;

/// Result type for storefront operations
pub type Result<T> = std::result::Result<T, ShopError>;

/// Errors produced by storefront operations.
///
/// Every variant is turned into a structured JSON response at the request
/// boundary; none of them crash the process.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShopError {
    /// Product, address, order, promo or inbox entry is absent
    #[error("{0}")]
    NotFound(String),

    /// Reservation exceeds available units
    #[error("Out of stock")]
    OutOfStock,

    /// Missing or invalid credential
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed to touch this resource
    #[error("{0}")]
    Forbidden(String),

    /// Missing required field or malformed value
    #[error("{0}")]
    Validation(String),

    /// Promo exists but its expiry has passed
    #[error("Promo code expired")]
    PromoExpired,

    /// Payment signature did not match
    #[error("Signature verification failed")]
    SignatureInvalid,

    /// Checkout attempted with an empty cart or a zero total
    #[error("Cart is empty or order total is zero")]
    EmptyOrder,

    /// Duplicate unique key or competing write
    #[error("{0}")]
    Conflict(String),

    /// Admin requested a status change the order lifecycle forbids
    #[error("Cannot move order from {from} to {to}")]
    InvalidStatusTransition {
        /// Current status
        from: OrderStatus,
        /// Requested status
        to: OrderStatus,
    },

    /// The payment gateway could not mint an order
    #[error("Payment order creation failed: {0}")]
    PaymentGateway(String),

    /// Commit of a verified payment did not complete
    ///
    /// When `order_id` is set the order is durable and only the cart clear
    /// failed; replaying the same confirmation finishes the job.
    #[error("Order persistence failed: {message}")]
    PersistenceFailed {
        /// Order that was written before the failure, if any
        order_id: Option<OrderId>,
        /// What went wrong
        message: String,
    },

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// The checkout flow did not finish within the request timeout
    #[error("{0}")]
    Timeout(String),

    /// The service is shutting down
    #[error("{0}")]
    Unavailable(String),
}

impl ShopError {
    /// Shorthand for [`ShopError::NotFound`]
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Shorthand for [`ShopError::Validation`]
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for [`ShopError::Conflict`]
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Wrap a storage failure, keeping the operation name in the message
    #[must_use]
    pub fn storage(operation: &str, error: impl std::fmt::Display) -> Self {
        Self::Storage(format!("Failed to {operation}: {error}"))
    }
}

impl From<StoreError> for ShopError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Timeout => Self::Timeout("Checkout did not finish in time, please retry".to_string()),
            StoreError::ShutdownInProgress | StoreError::ShutdownTimeout(_) | StoreError::ChannelClosed => {
                Self::Unavailable(err.to_string())
            },
        }
    }
}

impl From<ShopError> for AppError {
    fn from(err: ShopError) -> Self {
        let message = err.to_string();
        match err {
            ShopError::NotFound(_) => AppError::missing(message),
            ShopError::OutOfStock => AppError::new(StatusCode::BAD_REQUEST, message, "OUT_OF_STOCK"),
            ShopError::Unauthorized(_) => AppError::unauthorized(message),
            ShopError::Forbidden(_) => AppError::forbidden(message),
            ShopError::Validation(_) => AppError::validation(message),
            ShopError::PromoExpired => {
                AppError::new(StatusCode::BAD_REQUEST, message, "PROMO_EXPIRED")
            },
            ShopError::SignatureInvalid => {
                AppError::new(StatusCode::BAD_REQUEST, message, "SIGNATURE_INVALID")
            },
            ShopError::EmptyOrder => AppError::new(StatusCode::BAD_REQUEST, message, "EMPTY_ORDER"),
            ShopError::Conflict(_) | ShopError::InvalidStatusTransition { .. } => {
                AppError::conflict(message)
            },
            ShopError::PaymentGateway(_) => {
                AppError::bad_gateway("Payment order creation failed", "PAYMENT_ORDER_CREATION_FAILED")
                    .with_source(anyhow::Error::new(err))
            },
            ShopError::PersistenceFailed { order_id, .. } => {
                let message = match order_id {
                    Some(id) => format!("Order {id} was saved but checkout did not finish, please retry"),
                    None => "Order could not be saved, please retry".to_string(),
                };
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, message, "PERSISTENCE_FAILED")
                    .with_source(anyhow::Error::new(err))
            },
            ShopError::Storage(_) => {
                AppError::internal("An internal error occurred").with_source(anyhow::Error::new(err))
            },
            ShopError::Timeout(_) => AppError::timeout(message),
            ShopError::Unavailable(_) => AppError::unavailable(message),
        }
    }
}

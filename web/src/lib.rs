//! Axum integration for the storefront services.
//!
//! Handlers in the application crate turn HTTP requests into calls on
//! repositories or actions on a [`Store`](storefront_runtime::Store), then
//! map the outcome back to a response. This crate carries the pieces every
//! handler shares:
//!
//! - [`AppError`]: JSON error envelope with a stable machine code
//! - [`CorrelationId`] and [`ClientIp`] extractors
//! - [`middleware::correlation_id_layer`]: span per request, ID echoed back
//! - [`handlers::health`]: liveness and store-backed readiness
//! - [`handlers::websocket`]: stream a broadcast channel to a client

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

// Re-export key types for convenience
pub use error::AppError;
pub use extractors::{ClientIp, CorrelationId};
pub use middleware::{correlation_id_layer, CORRELATION_ID_HEADER};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;

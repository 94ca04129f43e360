//! Storefront service.
//!
//! The interesting part of the shop is the reservation core:
//!
//! - **Stock ledger and carts** ([`ledger`]): reserving a unit moves it from a
//!   product's stock into a user's cart atomically; releasing moves it back.
//!   Stock plus all reserved quantities of a product is conserved.
//! - **Promo evaluation** ([`promo`]): active, unexpired codes give an absolute
//!   discount that never drives a total below zero.
//! - **Checkout** ([`checkout`]): a reducer running in a
//!   [`Store`](storefront_runtime::Store) prices the cart, mints a payment
//!   gateway order, verifies the gateway's signature and commits the order
//!   exactly once per gateway payment id before clearing the cart.
//!
//! ```text
//! POST /cart/add ──► ledger.reserve ──► stock - 1, cart + 1
//!
//! POST /payment/create-order          POST /payment/verify-and-save
//!        │                                     │
//!        ▼                                     ▼
//!   StartCheckout ─► DraftPriced ─►      SubmitPayment ─► OrderRecorded ─►
//!   GatewayOrderCreated                  CheckoutCompleted (cart cleared)
//! ```
//!
//! Around it sit the plainer parts of the shop: catalog, addresses, orders,
//! reviews, newsletter and admin notifications pushed to user inboxes over
//! WebSockets. Every repository has an in-memory and a `PostgreSQL` backend.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod addresses;
pub mod api;
pub mod auth;
pub mod checkout;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod newsletter;
pub mod notifications;
pub mod orders;
pub mod promo;
pub mod reviews;
pub mod server;
pub mod telemetry;
pub mod types;
pub mod users;

pub use config::Config;
pub use error::{Result, ShopError};
pub use server::{build_router, AppState, Repositories};
pub use types::*;

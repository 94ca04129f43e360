//! Shared HTTP handlers.

pub mod health;
pub mod websocket;

pub use health::{health_check, health_check_with_store};

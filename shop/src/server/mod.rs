//! HTTP server: shared state, router and operational endpoints.

pub mod health;
pub mod routes;
pub mod state;

pub use routes::build_router;
pub use state::{payment_gateway, AppState, Repositories};

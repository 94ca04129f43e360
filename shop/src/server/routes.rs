//! Router configuration.

use super::health::{health_check, metrics, readiness_check};
use super::state::AppState;
use crate::api::{addresses, cart, newsletter, notifications, orders, payments, products, promos, reviews};
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use storefront_web::correlation_id_layer;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Build the complete router.
///
/// Health and metrics are open; catalog reads, promo checks and newsletter
/// signups are public; everything touching a cart, an order, an address or
/// an inbox needs a bearer token; catalog, promo, order and notification
/// administration need an admin token.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Operations
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check))
        .route("/metrics", get(metrics))
        // Catalog
        .route("/products", get(products::list_products).post(products::create_product))
        .route("/products/:id", delete(products::delete_product))
        .route("/product/:id", get(products::get_product))
        // Reviews
        .route("/product/:id/review", post(reviews::add_review))
        .route("/product/:id/reviews", get(reviews::list_reviews))
        .route("/product/:id/average-rating", get(reviews::average_rating))
        // Cart
        .route("/cart", get(cart::get_cart))
        .route("/cart/add", post(cart::add_to_cart))
        .route("/cart/remove", post(cart::remove_from_cart))
        // Promos
        .route("/apply-promo", post(promos::apply_promo))
        .route("/promos", get(promos::latest_promos).post(promos::create_promo))
        // Checkout
        .route("/payment/create-order", post(payments::create_order))
        .route("/payment/verify-and-save", post(payments::verify_and_save))
        // Orders
        .route("/orders/me", get(orders::my_orders))
        .route("/orders/all", get(orders::all_orders))
        .route("/order/:id", get(orders::get_order))
        .route("/orders/update-status/:id", put(orders::update_status))
        // Addresses
        .route("/address", get(addresses::list_addresses).post(addresses::add_address))
        .route(
            "/address/:id",
            put(addresses::update_address).delete(addresses::delete_address),
        )
        .route("/address/:id/default", put(addresses::set_default_address))
        // Newsletter
        .route("/newsletter/subscribe", post(newsletter::subscribe))
        .route("/newsletter/subscribers", get(newsletter::subscribers))
        // Notifications
        .route(
            "/notifications",
            get(notifications::list_notifications).post(notifications::send_notification),
        )
        .route("/notifications/me", get(notifications::my_notifications))
        .route("/notifications/me/read", put(notifications::mark_all_read))
        .route("/notifications/stream", get(notifications::stream))
        .route("/notifications/:entry_id/read", put(notifications::mark_read))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}

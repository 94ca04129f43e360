//! Tracing setup and business metrics.

use metrics::describe_counter;
use tracing_subscriber::EnvFilter;

/// Metric names emitted by the storefront.
pub mod names {
    /// Units moved from stock into a cart
    pub const RESERVATIONS: &str = "shop.stock.reserved";
    /// Units moved from a cart back into stock
    pub const RELEASES: &str = "shop.stock.released";
    /// Reservations refused for lack of stock
    pub const OUT_OF_STOCK: &str = "shop.stock.out_of_stock";
    /// Gateway orders minted
    pub const GATEWAY_ORDERS: &str = "shop.checkout.gateway_orders";
    /// Payment signatures that did not verify
    pub const SIGNATURE_FAILURES: &str = "shop.checkout.signature_failures";
    /// Orders written for the first time
    pub const ORDERS_COMMITTED: &str = "shop.checkout.orders_committed";
    /// Verify requests answered with an existing order
    pub const ORDERS_REPLAYED: &str = "shop.checkout.orders_replayed";
    /// Order writes or cart clears that failed after a verified payment
    pub const PERSISTENCE_FAILURES: &str = "shop.checkout.persistence_failures";
    /// Notifications fanned out to user inboxes
    pub const NOTIFICATIONS_SENT: &str = "shop.notifications.sent";
}

/// Describe the storefront metrics on the installed recorder.
pub fn describe_metrics() {
    describe_counter!(names::RESERVATIONS, "Units moved from stock into a cart");
    describe_counter!(names::RELEASES, "Units moved from a cart back into stock");
    describe_counter!(names::OUT_OF_STOCK, "Reservations refused for lack of stock");
    describe_counter!(names::GATEWAY_ORDERS, "Payment gateway orders minted");
    describe_counter!(names::SIGNATURE_FAILURES, "Payment signatures that failed verification");
    describe_counter!(names::ORDERS_COMMITTED, "Orders committed after verified payment");
    describe_counter!(names::ORDERS_REPLAYED, "Verify requests that found an existing order");
    describe_counter!(
        names::PERSISTENCE_FAILURES,
        "Order writes or cart clears that failed after verified payment"
    );
    describe_counter!(names::NOTIFICATIONS_SENT, "Admin notifications fanned out");
}

/// Install the global `fmt` subscriber.
///
/// `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

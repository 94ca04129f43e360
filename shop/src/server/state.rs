//! Application state shared across handlers.

use crate::addresses::{AddressBook, InMemoryAddressBook, PostgresAddressBook};
use crate::auth::TokenVerifier;
use crate::checkout::{
    Checkout, CheckoutEnvironment, CheckoutSettings, MockPaymentGateway, PaymentGateway, RazorpayGateway,
};
use crate::config::{CatalogConfig, Config, GatewayKind, PaymentConfig};
use crate::error::{Result, ShopError};
use crate::ledger::{InMemoryLedger, InventoryLedger, PostgresLedger};
use crate::newsletter::{InMemorySubscriberList, PostgresSubscriberList, SubscriberList};
use crate::notifications::{
    InMemoryNotificationStore, NotificationHub, NotificationStore, Notifications, PostgresNotificationStore,
};
use crate::orders::{InMemoryOrderRepository, OrderRepository, PostgresOrderRepository};
use crate::promo::{InMemoryPromoStore, PostgresPromoStore, PromoStore};
use crate::reviews::{InMemoryReviewStore, PostgresReviewStore, ReviewStore};
use crate::users::{InMemoryUserDirectory, PostgresUserDirectory, UserDirectory};
use axum::extract::FromRef;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use storefront_core::environment::Clock;
use storefront_runtime::metrics::MetricsServer;

/// The repositories behind the service, all of one backend.
#[derive(Clone)]
pub struct Repositories {
    /// Stock and carts
    pub ledger: Arc<dyn InventoryLedger>,
    /// Promo codes
    pub promos: Arc<dyn PromoStore>,
    /// Shipping addresses
    pub addresses: Arc<dyn AddressBook>,
    /// Orders
    pub orders: Arc<dyn OrderRepository>,
    /// Known users
    pub users: Arc<dyn UserDirectory>,
    /// Notifications and inboxes
    pub notifications: Arc<dyn NotificationStore>,
    /// Reviews
    pub reviews: Arc<dyn ReviewStore>,
    /// Newsletter subscribers
    pub newsletter: Arc<dyn SubscriberList>,
}

impl Repositories {
    /// Everything in process memory
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            ledger: Arc::new(InMemoryLedger::new()),
            promos: Arc::new(InMemoryPromoStore::new()),
            addresses: Arc::new(InMemoryAddressBook::new()),
            orders: Arc::new(InMemoryOrderRepository::new()),
            users: Arc::new(InMemoryUserDirectory::new()),
            notifications: Arc::new(InMemoryNotificationStore::new()),
            reviews: Arc::new(InMemoryReviewStore::new()),
            newsletter: Arc::new(InMemorySubscriberList::new()),
        }
    }

    /// Everything in `PostgreSQL`
    #[must_use]
    pub fn postgres(pool: &PgPool) -> Self {
        Self {
            ledger: Arc::new(PostgresLedger::new(pool.clone())),
            promos: Arc::new(PostgresPromoStore::new(pool.clone())),
            addresses: Arc::new(PostgresAddressBook::new(pool.clone())),
            orders: Arc::new(PostgresOrderRepository::new(pool.clone())),
            users: Arc::new(PostgresUserDirectory::new(pool.clone())),
            notifications: Arc::new(PostgresNotificationStore::new(pool.clone())),
            reviews: Arc::new(PostgresReviewStore::new(pool.clone())),
            newsletter: Arc::new(PostgresSubscriberList::new(pool.clone())),
        }
    }
}

/// Build the payment gateway named in configuration.
///
/// # Errors
///
/// Returns `PaymentGateway` if the HTTP client cannot be built.
pub fn payment_gateway(config: &PaymentConfig) -> Result<Arc<dyn PaymentGateway>> {
    match config.gateway {
        GatewayKind::Mock => Ok(Arc::new(MockPaymentGateway::new(config.key_secret.clone()))),
        GatewayKind::Razorpay => {
            let gateway = RazorpayGateway::new(
                config.key_id.clone(),
                config.key_secret.clone(),
                config.api_base.clone(),
                Duration::from_secs(config.request_timeout),
            )
            .map_err(|e| ShopError::PaymentGateway(e.to_string()))?;
            Ok(Arc::new(gateway))
        },
    }
}

/// Shared application state.
///
/// Cloned per request; every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Stock and carts
    pub ledger: Arc<dyn InventoryLedger>,
    /// Promo codes
    pub promos: Arc<dyn PromoStore>,
    /// Shipping addresses
    pub addresses: Arc<dyn AddressBook>,
    /// Orders
    pub orders: Arc<dyn OrderRepository>,
    /// Known users
    pub users: Arc<dyn UserDirectory>,
    /// Reviews
    pub reviews: Arc<dyn ReviewStore>,
    /// Newsletter subscribers
    pub newsletter: Arc<dyn SubscriberList>,
    /// Notification fan-out and push
    pub notifications: Notifications,
    /// Checkout store
    pub checkout: Checkout,
    /// Bearer token verifier
    pub verifier: Arc<TokenVerifier>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Catalog defaults
    pub catalog: CatalogConfig,
    /// Prometheus renderer, when the recorder is installed
    pub metrics: Option<Arc<MetricsServer>>,
}

impl AppState {
    /// Wire the service from configuration and a set of repositories.
    #[must_use]
    pub fn new(
        config: &Config,
        repos: Repositories,
        gateway: Arc<dyn PaymentGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let checkout = Checkout::new(
            CheckoutEnvironment {
                ledger: Arc::clone(&repos.ledger),
                promos: Arc::clone(&repos.promos),
                orders: Arc::clone(&repos.orders),
                gateway,
                clock: Arc::clone(&clock),
                settings: CheckoutSettings {
                    currency: config.payment.currency.clone(),
                    session_retention: Duration::from_secs(config.checkout.session_retention),
                    abandon_after: Duration::from_secs(config.checkout.abandon_after),
                },
            },
            Duration::from_secs(config.checkout.request_timeout),
        );

        let notifications = Notifications::new(
            repos.notifications,
            Arc::clone(&repos.users),
            NotificationHub::new(config.notifications.channel_capacity),
            Arc::clone(&clock),
            Duration::from_millis(config.notifications.duplicate_window_ms),
        );

        Self {
            ledger: repos.ledger,
            promos: repos.promos,
            addresses: repos.addresses,
            orders: repos.orders,
            users: repos.users,
            reviews: repos.reviews,
            newsletter: repos.newsletter,
            notifications,
            checkout,
            verifier: Arc::new(TokenVerifier::new(&config.auth.token_secret)),
            clock,
            catalog: config.catalog.clone(),
            metrics: None,
        }
    }

    /// Attach the Prometheus renderer served on `/metrics`
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<MetricsServer>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl FromRef<AppState> for Checkout {
    fn from_ref(state: &AppState) -> Self {
        state.checkout.clone()
    }
}

impl FromRef<AppState> for Notifications {
    fn from_ref(state: &AppState) -> Self {
        state.notifications.clone()
    }
}

//! Configuration management for the storefront service.
//!
//! Loads configuration from environment variables with sensible defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Storage backend configuration
    pub storage: StorageConfig,
    /// Payment gateway configuration
    pub payment: PaymentConfig,
    /// Credential verification
    pub auth: AuthConfig,
    /// Checkout store tunables
    pub checkout: CheckoutConfig,
    /// Notification fan-out tunables
    pub notifications: NotificationConfig,
    /// Catalog defaults
    pub catalog: CatalogConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Port advertised for Prometheus scraping
    pub metrics_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout: u64,
}

/// Which repositories back the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process memory, lost on restart
    Memory,
    /// `PostgreSQL` via `DATABASE_URL`
    Postgres,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            other => Err(ConfigError::Invalid {
                key: "STORAGE_BACKEND",
                value: other.to_string(),
            }),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Selected backend
    pub backend: StorageBackend,
    /// `PostgreSQL` connection URL
    pub database_url: Option<String>,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of idle connections in the pool
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

/// Which payment gateway to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayKind {
    /// In-process gateway that signs with `RAZORPAY_KEY_SECRET`
    Mock,
    /// Razorpay Orders API
    Razorpay,
}

impl FromStr for GatewayKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "razorpay" => Ok(Self::Razorpay),
            other => Err(ConfigError::Invalid {
                key: "PAYMENT_GATEWAY",
                value: other.to_string(),
            }),
        }
    }
}

/// Payment gateway configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Selected gateway
    pub gateway: GatewayKind,
    /// Public key id handed to clients
    pub key_id: String,
    /// Merchant secret; signs and verifies payments
    pub key_secret: String,
    /// Gateway API base URL
    pub api_base: String,
    /// ISO currency code
    pub currency: String,
    /// Gateway request timeout in seconds
    pub request_timeout: u64,
}

impl std::fmt::Debug for PaymentConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentConfig")
            .field("gateway", &self.gateway)
            .field("key_id", &self.key_id)
            .field("key_secret", &"<redacted>")
            .field("api_base", &self.api_base)
            .field("currency", &self.currency)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Authentication configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC key for bearer tokens
    pub token_secret: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig").field("token_secret", &"<redacted>").finish()
    }
}

/// Checkout configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfig {
    /// How long a checkout request waits for its outcome, in seconds
    pub request_timeout: u64,
    /// How long finished sessions are kept, in seconds
    pub session_retention: u64,
    /// How long unfinished sessions are kept, in seconds
    pub abandon_after: u64,
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Minimum gap between two notifications, in milliseconds
    pub duplicate_window_ms: u64,
    /// Events buffered per WebSocket subscriber
    pub channel_capacity: usize,
}

/// Catalog defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Stock of a product created without one
    pub default_stock: u32,
    /// Country of an address submitted without one
    pub default_country: String,
}

/// Configuration that cannot be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable holds a value we do not understand
    #[error("invalid value {value:?} for {key}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Offending value
        value: String,
    },
    /// A variable the selected setup needs is unset
    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Parse `key` when it is set; unparsable values count as unset.
fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns error if a backend or gateway selector is unrecognized or a
    /// variable the selection needs is missing.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = Self {
            server: ServerConfig {
                host: text("HOST", "0.0.0.0"),
                port: parsed(&lookup, "PORT").unwrap_or(2005),
                log_level: text("RUST_LOG", "shop=info,storefront_runtime=info,tower_http=info"),
                metrics_port: parsed(&lookup, "METRICS_PORT").unwrap_or(9090),
                shutdown_timeout: parsed(&lookup, "SHUTDOWN_TIMEOUT").unwrap_or(30),
            },
            storage: StorageConfig {
                backend: lookup("STORAGE_BACKEND")
                    .map(|s| s.parse())
                    .transpose()?
                    .unwrap_or(StorageBackend::Memory),
                database_url: lookup("DATABASE_URL").filter(|s| !s.trim().is_empty()),
                max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS").unwrap_or(10),
                min_connections: parsed(&lookup, "DATABASE_MIN_CONNECTIONS").unwrap_or(1),
                connect_timeout_secs: parsed(&lookup, "DATABASE_CONNECT_TIMEOUT").unwrap_or(30),
            },
            payment: PaymentConfig {
                gateway: lookup("PAYMENT_GATEWAY")
                    .map(|s| s.parse())
                    .transpose()?
                    .unwrap_or(GatewayKind::Mock),
                key_id: text("RAZORPAY_KEY_ID", "rzp_test_mock"),
                key_secret: text("RAZORPAY_KEY_SECRET", "dev-secret-change-in-production"),
                api_base: text("RAZORPAY_API_BASE", "https://api.razorpay.com"),
                currency: text("PAYMENT_CURRENCY", "INR"),
                request_timeout: parsed(&lookup, "PAYMENT_REQUEST_TIMEOUT").unwrap_or(10),
            },
            auth: AuthConfig {
                token_secret: text("AUTH_TOKEN_SECRET", "dev-secret-change-in-production"),
            },
            checkout: CheckoutConfig {
                request_timeout: parsed(&lookup, "CHECKOUT_REQUEST_TIMEOUT").unwrap_or(15),
                session_retention: parsed(&lookup, "CHECKOUT_SESSION_RETENTION").unwrap_or(300),
                abandon_after: parsed(&lookup, "CHECKOUT_ABANDON_AFTER").unwrap_or(86_400),
            },
            notifications: NotificationConfig {
                duplicate_window_ms: parsed(&lookup, "NOTIFICATION_DUPLICATE_WINDOW_MS").unwrap_or(3_000),
                channel_capacity: parsed(&lookup, "NOTIFICATION_CHANNEL_CAPACITY").unwrap_or(256),
            },
            catalog: CatalogConfig {
                default_stock: parsed(&lookup, "DEFAULT_PRODUCT_STOCK").unwrap_or(10),
                default_country: text("DEFAULT_COUNTRY", "India"),
            },
        };

        if config.storage.backend == StorageBackend::Postgres && config.storage.database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }
        if config.payment.gateway == GatewayKind::Razorpay
            && (lookup("RAZORPAY_KEY_ID").is_none() || lookup("RAZORPAY_KEY_SECRET").is_none())
        {
            return Err(ConfigError::Missing("RAZORPAY_KEY_ID and RAZORPAY_KEY_SECRET"));
        }
        Ok(config)
    }

    /// Graceful shutdown budget
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.server.port, 2005);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.payment.gateway, GatewayKind::Mock);
        assert_eq!(config.payment.currency, "INR");
        assert_eq!(config.checkout.session_retention, 300);
        assert_eq!(config.notifications.duplicate_window_ms, 3_000);
        assert_eq!(config.catalog.default_stock, 10);
        assert_eq!(config.catalog.default_country, "India");
    }

    #[test]
    fn unparsable_numbers_fall_back_to_defaults() {
        let config = load(&[("PORT", "eighty"), ("DEFAULT_PRODUCT_STOCK", "25")]).unwrap();
        assert_eq!(config.server.port, 2005);
        assert_eq!(config.catalog.default_stock, 25);
    }

    #[test]
    fn wide_numeric_settings_parse_at_their_own_width() {
        let config = load(&[
            ("PORT", "8080"),
            ("CHECKOUT_ABANDON_AFTER", "100000"),
            ("NOTIFICATION_DUPLICATE_WINDOW_MS", "70000"),
            ("NOTIFICATION_CHANNEL_CAPACITY", "1024"),
            ("DATABASE_MAX_CONNECTIONS", "40"),
            ("PAYMENT_REQUEST_TIMEOUT", "25"),
        ])
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.checkout.abandon_after, 100_000);
        assert_eq!(config.notifications.duplicate_window_ms, 70_000);
        assert_eq!(config.notifications.channel_capacity, 1024);
        assert_eq!(config.storage.max_connections, 40);
        assert_eq!(config.payment.request_timeout, 25);
    }

    #[test]
    fn postgres_requires_a_url() {
        assert_eq!(
            load(&[("STORAGE_BACKEND", "postgres")]).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );
        let config = load(&[("STORAGE_BACKEND", "Postgres"), ("DATABASE_URL", "postgres://db/shop")]).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Postgres);
    }

    #[test]
    fn razorpay_requires_keys_and_unknown_selectors_fail() {
        assert!(load(&[("PAYMENT_GATEWAY", "razorpay")]).is_err());
        assert!(matches!(
            load(&[("STORAGE_BACKEND", "mongo")]),
            Err(ConfigError::Invalid { key: "STORAGE_BACKEND", .. })
        ));
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let config = load(&[("RAZORPAY_KEY_SECRET", "hunter2")]).unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}

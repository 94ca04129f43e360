//! Payment gateway boundary.
//!
//! The gateway mints an external order sized to the checkout total and, after
//! the user pays through the gateway's own UI, hands back a signed
//! `(order id, payment id)` pair. Verification is local: the signature is an
//! HMAC over the pair keyed with the merchant secret.

use super::signature;
use crate::types::Money;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Payment gateway result
pub type GatewayResult<T> = Result<T, PaymentGatewayError>;

/// Payment gateway error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentGatewayError {
    /// Amount the gateway cannot charge (zero)
    InvalidAmount,
    /// Gateway did not answer in time
    Timeout,
    /// Transport failure
    Unreachable {
        /// Error message
        message: String,
    },
    /// Gateway answered with a non-success status
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },
    /// Gateway answered with a body we could not read
    InvalidResponse {
        /// Error message
        message: String,
    },
}

impl std::fmt::Display for PaymentGatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAmount => write!(f, "Invalid amount"),
            Self::Timeout => write!(f, "Gateway timeout"),
            Self::Unreachable { message } => write!(f, "Gateway unreachable: {message}"),
            Self::Rejected { status, message } => write!(f, "Gateway rejected order ({status}): {message}"),
            Self::InvalidResponse { message } => write!(f, "Invalid gateway response: {message}"),
        }
    }
}

impl std::error::Error for PaymentGatewayError {}

/// Request to mint a gateway order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayOrderRequest {
    /// Amount in minor units
    #[serde(serialize_with = "serialize_minor")]
    pub amount: Money,
    /// ISO currency code
    pub currency: String,
    /// Merchant receipt reference
    pub receipt: String,
    /// Free-form notes stored with the gateway order
    pub notes: BTreeMap<String, String>,
}

fn serialize_minor<S: serde::Serializer>(amount: &Money, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(amount.minor())
}

/// External order record minted by the gateway.
///
/// Amounts are in minor units, as the gateway reports them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    /// Gateway order id
    pub id: String,
    /// Amount in minor units
    pub amount: u64,
    /// ISO currency code
    pub currency: String,
    /// Merchant receipt reference
    #[serde(default)]
    pub receipt: Option<String>,
    /// Gateway-side status
    #[serde(default)]
    pub status: String,
}

/// Payment gateway trait
pub trait PaymentGateway: Send + Sync {
    /// Mint an external order for `request.amount`.
    ///
    /// # Errors
    ///
    /// Returns error if the gateway is unreachable or refuses the order
    fn create_order(
        &self,
        request: GatewayOrderRequest,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<GatewayOrder>> + Send + '_>>;

    /// Check the signature the gateway attached to a completed payment.
    fn verify_signature(&self, gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> bool;

    /// Public key id the client needs to open the gateway's payment UI
    fn key_id(&self) -> &str;
}

/// Razorpay Orders API client.
#[derive(Clone)]
pub struct RazorpayGateway {
    key_id: String,
    key_secret: String,
    api_base: String,
    http_client: reqwest::Client,
}

impl RazorpayGateway {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> GatewayResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PaymentGatewayError::Unreachable {
                message: e.to_string(),
            })?;
        Ok(Self {
            key_id: key_id.into(),
            key_secret: key_secret.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    async fn post_order(&self, request: GatewayOrderRequest) -> GatewayResult<GatewayOrder> {
        if request.amount.is_zero() {
            return Err(PaymentGatewayError::InvalidAmount);
        }

        let response = self
            .http_client
            .post(format!("{}/v1/orders", self.api_base))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PaymentGatewayError::Timeout
                } else {
                    PaymentGatewayError::Unreachable {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), body = %body, "Gateway order creation failed");
            return Err(PaymentGatewayError::Rejected {
                status: status.as_u16(),
                message: body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| PaymentGatewayError::InvalidResponse {
                message: e.to_string(),
            })
    }
}

impl PaymentGateway for RazorpayGateway {
    fn create_order(
        &self,
        request: GatewayOrderRequest,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<GatewayOrder>> + Send + '_>> {
        Box::pin(self.post_order(request))
    }

    fn verify_signature(&self, gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> bool {
        signature::verify(
            self.key_secret.as_bytes(),
            gateway_order_id,
            gateway_payment_id,
            signature,
        )
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }
}

/// In-process gateway for development and tests.
///
/// Mints `order_…` ids locally and verifies signatures with its own secret,
/// so tests can produce valid payments with [`MockPaymentGateway::sign`].
#[derive(Clone, Debug)]
pub struct MockPaymentGateway {
    key_id: String,
    secret: String,
    fail_orders: bool,
}

impl MockPaymentGateway {
    /// Creates a mock gateway keyed with `secret`
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            key_id: "rzp_test_mock".to_string(),
            secret: secret.into(),
            fail_orders: false,
        }
    }

    /// Creates a mock gateway whose order creation always fails
    #[must_use]
    pub fn failing(secret: impl Into<String>) -> Self {
        Self {
            fail_orders: true,
            ..Self::new(secret)
        }
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared(secret: impl Into<String>) -> Arc<dyn PaymentGateway> {
        Arc::new(Self::new(secret))
    }

    /// Sign a payment the way the real gateway would
    #[must_use]
    pub fn sign(&self, gateway_order_id: &str, gateway_payment_id: &str) -> String {
        signature::sign(self.secret.as_bytes(), gateway_order_id, gateway_payment_id).unwrap_or_default()
    }
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(14)
        .map(char::from)
        .collect()
}

impl PaymentGateway for MockPaymentGateway {
    fn create_order(
        &self,
        request: GatewayOrderRequest,
    ) -> Pin<Box<dyn Future<Output = GatewayResult<GatewayOrder>> + Send + '_>> {
        let id = format!("order_{}", random_suffix());
        let fail = self.fail_orders;
        Box::pin(async move {
            if fail {
                return Err(PaymentGatewayError::Unreachable {
                    message: "mock gateway configured to fail".to_string(),
                });
            }
            if request.amount.is_zero() {
                return Err(PaymentGatewayError::InvalidAmount);
            }

            tracing::info!(
                gateway_order_id = %id,
                amount = request.amount.minor(),
                "Mock gateway order created"
            );

            Ok(GatewayOrder {
                id,
                amount: request.amount.minor(),
                currency: request.currency,
                receipt: Some(request.receipt),
                status: "created".to_string(),
            })
        })
    }

    fn verify_signature(&self, gateway_order_id: &str, gateway_payment_id: &str, signature: &str) -> bool {
        signature::verify(self.secret.as_bytes(), gateway_order_id, gateway_payment_id, signature)
    }

    fn key_id(&self) -> &str {
        &self.key_id
    }
}

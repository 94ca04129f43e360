//! Payment endpoints driving the checkout store.
//!
//! - POST /payment/create-order: price the caller's cart server-side and mint
//!   a gateway order sized to the total.
//! - POST /payment/verify-and-save: verify the gateway's signature and commit
//!   the order exactly once per gateway payment id.
//!
//! Both requests are keyed by the request's correlation id, so the checkout
//! session of a request can be traced through the store.

use super::money_from_json;
use crate::addresses::AddressFields;
use crate::auth::AuthUser;
use crate::checkout::{GatewayOrder, PaymentConfirmation, VerifiedPayment};
use crate::error::ShopError;
use crate::orders::{Order, OrderItem};
use crate::promo::PromoCode;
use crate::server::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use storefront_web::{CorrelationId, WebResult};

/// `POST /payment/create-order` body.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// Total the client expects to pay, in major units
    pub amount: Option<f64>,
    /// Promo to apply
    pub promo_code: Option<String>,
}

/// Gateway order the client opens the payment UI with.
#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    /// Always true
    pub success: bool,
    /// Gateway order (amount in minor units)
    pub order: GatewayOrder,
    /// Public gateway key
    pub key: String,
}

/// Draft the caller's order and open a gateway order for it.
pub async fn create_order(
    State(state): State<AppState>,
    CorrelationId(correlation_id): CorrelationId,
    AuthUser(identity): AuthUser,
    Json(request): Json<CreateOrderRequest>,
) -> WebResult<Json<CreateOrderResponse>> {
    let expected_total = request
        .amount
        .map(|amount| money_from_json(amount, "Amount"))
        .transpose()?;
    let promo_code = request.promo_code.as_deref().and_then(PromoCode::parse);

    let intent = state
        .checkout
        .create_order(correlation_id, identity.user_id, promo_code, expected_total)
        .await?;
    Ok(Json(CreateOrderResponse {
        success: true,
        order: intent.order,
        key: intent.key_id,
    }))
}

/// `POST /payment/verify-and-save` body, as the gateway's checkout widget
/// hands it to the client.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyPaymentRequest {
    /// Gateway order id
    pub razorpay_order_id: String,
    /// Gateway payment id
    pub razorpay_payment_id: String,
    /// Hex HMAC over `order_id|payment_id`
    pub razorpay_signature: String,
    /// Shipping address
    pub address: AddressFields,
    /// Line items to snapshot on the order
    #[serde(rename = "cartItems")]
    pub cart_items: Vec<serde_json::Value>,
    /// Amount paid in major units
    pub total: Option<f64>,
}

impl VerifyPaymentRequest {
    fn confirmation(&self) -> PaymentConfirmation {
        PaymentConfirmation {
            gateway_order_id: self.razorpay_order_id.clone(),
            gateway_payment_id: self.razorpay_payment_id.clone(),
            signature: self.razorpay_signature.clone(),
        }
    }

    fn into_payment(self) -> Result<VerifiedPayment, ShopError> {
        let items = self
            .cart_items
            .into_iter()
            .map(|item| {
                serde_json::from_value::<OrderItem>(item)
                    .map_err(|_| ShopError::validation("Cart items need an id, a non-negative price and a quantity"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let total = match self.total {
            Some(total) => money_from_json(total, "Total")?,
            None => return Err(ShopError::validation("Total is required")),
        };

        Ok(VerifiedPayment {
            confirmation: PaymentConfirmation {
                gateway_order_id: self.razorpay_order_id,
                gateway_payment_id: self.razorpay_payment_id,
                signature: self.razorpay_signature,
            },
            address: self.address,
            items,
            total,
        })
    }
}

/// The committed order.
#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    /// Always true
    pub success: bool,
    /// The order
    pub order: Order,
}

/// Verify a completed payment and record its order.
///
/// 201 the first time, 200 when the same payment was already recorded for
/// the caller. A forged signature is reported as `SIGNATURE_INVALID` even
/// when the rest of the body is malformed.
pub async fn verify_and_save(
    State(state): State<AppState>,
    CorrelationId(correlation_id): CorrelationId,
    AuthUser(identity): AuthUser,
    Json(request): Json<VerifyPaymentRequest>,
) -> WebResult<(StatusCode, Json<VerifyPaymentResponse>)> {
    let confirmation = request.confirmation();
    let payment = match request.into_payment() {
        Ok(payment) => payment,
        Err(invalid) => {
            state
                .checkout
                .check_signature(correlation_id, &identity.user_id, &confirmation)?;
            return Err(invalid.into());
        },
    };
    let committed = state
        .checkout
        .verify_and_save(correlation_id, identity.user_id, payment)
        .await?;

    let status = if committed.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((
        status,
        Json(VerifyPaymentResponse {
            success: true,
            order: committed.order,
        }),
    ))
}

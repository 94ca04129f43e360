//! Checkout reducer.
//!
//! Two requests drive a checkout:
//!
//! 1. `StartCheckout` prices the cart (`ApplyDiscount(ComputeCartTotal, promo)`)
//!    and asks the gateway for an order sized to the total. The request ends
//!    with `GatewayOrderCreated` or `CheckoutFailed`.
//! 2. `SubmitPayment` verifies the gateway signature, writes the order once
//!    per gateway payment id, then clears the buyer's cart. The request ends
//!    with `CheckoutCompleted` or `CheckoutFailed`.
//!
//! The user paying (or walking away) between the two happens outside the
//! system. Reservations are never touched by an abandoned or failed checkout.

use super::gateway::{GatewayOrderRequest, PaymentGateway};
use super::types::{CheckoutAction, CheckoutPhase, CheckoutSession, CheckoutState, PaymentConfirmation};
use crate::addresses::AddressFields;
use crate::error::ShopError;
use crate::ledger::InventoryLedger;
use crate::telemetry::names;
use crate::orders::{CommitOutcome, NewOrder, Order, OrderItem, OrderRepository};
use crate::promo::{self, PromoCode, PromoStore};
use crate::types::{Money, UserId};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use storefront_core::{effect::Effect, environment::Clock, reducer::Reducer, smallvec, SmallVec};
use uuid::Uuid;

/// Check a confirmation's HMAC, counting and logging a mismatch.
pub(crate) fn signature_matches(
    gateway: &dyn PaymentGateway,
    correlation_id: Uuid,
    user_id: &UserId,
    confirmation: &PaymentConfirmation,
) -> bool {
    let matches = gateway.verify_signature(
        &confirmation.gateway_order_id,
        &confirmation.gateway_payment_id,
        &confirmation.signature,
    );
    if !matches {
        metrics::counter!(names::SIGNATURE_FAILURES).increment(1);
        tracing::warn!(
            %correlation_id,
            user_id = %user_id,
            gateway_order_id = %confirmation.gateway_order_id,
            "Payment signature mismatch"
        );
    }
    matches
}

/// Checkout tunables.
#[derive(Clone, Debug)]
pub struct CheckoutSettings {
    /// Currency for gateway orders and committed orders
    pub currency: String,
    /// How long finished sessions are kept for inspection
    pub session_retention: Duration,
    /// How long an unfinished session is kept before it counts as abandoned
    pub abandon_after: Duration,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            currency: "INR".to_string(),
            session_retention: Duration::from_secs(300),
            abandon_after: Duration::from_secs(86_400),
        }
    }
}

/// Dependencies of the checkout reducer.
#[derive(Clone)]
pub struct CheckoutEnvironment {
    /// Stock and carts
    pub ledger: Arc<dyn InventoryLedger>,
    /// Promo lookup
    pub promos: Arc<dyn PromoStore>,
    /// Order persistence
    pub orders: Arc<dyn OrderRepository>,
    /// External payment gateway
    pub gateway: Arc<dyn PaymentGateway>,
    /// Time source
    pub clock: Arc<dyn Clock>,
    /// Tunables
    pub settings: CheckoutSettings,
}

/// Reducer for the checkout flow.
#[derive(Clone, Debug, Default)]
pub struct CheckoutReducer;

impl CheckoutReducer {
    /// Creates a new `CheckoutReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Drop finished sessions past retention and unfinished ones past the
    /// abandonment window.
    fn evict_stale(state: &mut CheckoutState, now: DateTime<Utc>, settings: &CheckoutSettings) {
        let before = state.sessions.len();

        state.sessions.retain(|_, session| {
            let limit = if session.phase.is_terminal() {
                settings.session_retention
            } else {
                settings.abandon_after
            };
            // A session stamped in the future (clock skew) has no age yet.
            now.signed_duration_since(session.updated_at)
                .to_std()
                .map_or(true, |age| age < limit)
        });

        let evicted = before - state.sessions.len();
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted stale checkout sessions");
        }
    }

    fn fail(correlation_id: Uuid, failure: ShopError) -> SmallVec<[Effect<CheckoutAction>; 4]> {
        smallvec![Effect::emit(CheckoutAction::CheckoutFailed {
            correlation_id,
            failure,
        })]
    }

    fn price_cart(
        correlation_id: Uuid,
        user_id: UserId,
        promo_code: Option<PromoCode>,
        env: &CheckoutEnvironment,
    ) -> Effect<CheckoutAction> {
        let ledger = Arc::clone(&env.ledger);
        let promos = Arc::clone(&env.promos);
        let now = env.clock.now();

        Effect::future(async move {
            let priced = async {
                let cart = ledger.cart(&user_id).await?;
                let subtotal = ledger.cart_total(&user_id).await?;
                let discount = match promo_code {
                    Some(code) => promo::validate(promos.as_ref(), &code, now).await?,
                    None => Money::ZERO,
                };
                Ok::<_, ShopError>(CheckoutAction::DraftPriced {
                    correlation_id,
                    lines: cart.lines().count(),
                    subtotal,
                    discount,
                })
            };
            Some(priced.await.unwrap_or_else(|failure| CheckoutAction::CheckoutFailed {
                correlation_id,
                failure,
            }))
        })
    }

    fn request_gateway_order(
        correlation_id: Uuid,
        user_id: &UserId,
        total: Money,
        env: &CheckoutEnvironment,
    ) -> Effect<CheckoutAction> {
        let gateway = Arc::clone(&env.gateway);
        let request = GatewayOrderRequest {
            amount: total,
            currency: env.settings.currency.clone(),
            receipt: format!("rcpt_{}", env.clock.now().timestamp_millis()),
            notes: BTreeMap::from([("userId".to_string(), user_id.to_string())]),
        };

        Effect::future(async move {
            match gateway.create_order(request).await {
                Ok(order) => Some(CheckoutAction::GatewayOrderCreated {
                    correlation_id,
                    key_id: gateway.key_id().to_string(),
                    order,
                }),
                Err(error) => {
                    tracing::warn!(%correlation_id, error = %error, "Gateway order creation failed");
                    Some(CheckoutAction::CheckoutFailed {
                        correlation_id,
                        failure: ShopError::PaymentGateway(error.to_string()),
                    })
                },
            }
        })
    }

    fn record_order(correlation_id: Uuid, order: NewOrder, env: &CheckoutEnvironment) -> Effect<CheckoutAction> {
        let orders = Arc::clone(&env.orders);

        Effect::future(async move {
            let user_id = order.user_id.clone();
            let payment_id = order.gateway_payment_id.clone();
            match orders.commit(order).await {
                Ok(CommitOutcome::Created(order)) => Some(CheckoutAction::OrderRecorded {
                    correlation_id,
                    order,
                    replayed: false,
                }),
                Ok(CommitOutcome::Existing(order)) => Some(CheckoutAction::OrderRecorded {
                    correlation_id,
                    order,
                    replayed: true,
                }),
                Err(error) => {
                    tracing::error!(
                        user_id = %user_id,
                        gateway_payment_id = %payment_id,
                        error = %error,
                        "Order write failed after verified payment"
                    );
                    Some(CheckoutAction::CheckoutFailed {
                        correlation_id,
                        failure: ShopError::PersistenceFailed {
                            order_id: None,
                            message: error.to_string(),
                        },
                    })
                },
            }
        })
    }

    fn clear_cart(correlation_id: Uuid, order: Order, replayed: bool, env: &CheckoutEnvironment) -> Effect<CheckoutAction> {
        let ledger = Arc::clone(&env.ledger);
        let orders = Arc::clone(&env.orders);

        Effect::future(async move {
            let cleared = async {
                if !ledger.clear_cart(&order.user_id, order.id).await? {
                    tracing::debug!(order_id = %order.id, "Cart already cleared for this order");
                }
                orders.mark_cart_cleared(order.id).await
            };
            match cleared.await {
                Ok(()) => Some(CheckoutAction::CheckoutCompleted {
                    correlation_id,
                    order: Order {
                        cart_cleared: true,
                        ..order
                    },
                    replayed,
                }),
                Err(error) => {
                    // The order is durable; replaying the same confirmation finishes the clear.
                    tracing::error!(
                        user_id = %order.user_id,
                        order_id = %order.id,
                        gateway_payment_id = %order.gateway_payment_id,
                        error = %error,
                        "Cart clear failed after order commit; manual reconciliation may be needed"
                    );
                    Some(CheckoutAction::CheckoutFailed {
                        correlation_id,
                        failure: ShopError::PersistenceFailed {
                            order_id: Some(order.id),
                            message: error.to_string(),
                        },
                    })
                },
            }
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn submit_payment(
        state: &mut CheckoutState,
        env: &CheckoutEnvironment,
        now: DateTime<Utc>,
        correlation_id: Uuid,
        user_id: UserId,
        confirmation: PaymentConfirmation,
        address: AddressFields,
        items: Vec<OrderItem>,
        total: Money,
    ) -> SmallVec<[Effect<CheckoutAction>; 4]> {
        let mut session = CheckoutSession::new(correlation_id, user_id.clone(), CheckoutPhase::VerifyingSignature, now);
        session.total = Some(total);
        session.gateway_order_id = Some(confirmation.gateway_order_id.clone());
        state.sessions.insert(correlation_id, session);

        if confirmation.is_incomplete() {
            return Self::fail(correlation_id, ShopError::validation("Missing payment fields"));
        }

        if !signature_matches(env.gateway.as_ref(), correlation_id, &user_id, &confirmation) {
            return Self::fail(correlation_id, ShopError::SignatureInvalid);
        }

        if items.is_empty() || total.is_zero() {
            return Self::fail(correlation_id, ShopError::EmptyOrder);
        }

        state.advance(&correlation_id, CheckoutPhase::Committing, now);
        let order = NewOrder {
            user_id,
            address,
            items,
            total,
            currency: env.settings.currency.clone(),
            gateway_order_id: confirmation.gateway_order_id,
            gateway_payment_id: confirmation.gateway_payment_id,
            gateway_signature: confirmation.signature,
            created_at: now,
        };
        smallvec![Self::record_order(correlation_id, order, env)]
    }
}

impl Reducer for CheckoutReducer {
    type State = CheckoutState;
    type Action = CheckoutAction;
    type Environment = CheckoutEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let now = env.clock.now();
        Self::evict_stale(state, now, &env.settings);

        match action {
            // ========== Drafting ==========
            CheckoutAction::StartCheckout {
                correlation_id,
                user_id,
                promo_code,
                expected_total,
            } => {
                let mut session = CheckoutSession::new(correlation_id, user_id.clone(), CheckoutPhase::Drafting, now);
                session.expected_total = expected_total;
                state.sessions.insert(correlation_id, session);

                smallvec![Self::price_cart(correlation_id, user_id, promo_code, env)]
            },

            CheckoutAction::DraftPriced {
                correlation_id,
                lines,
                subtotal,
                discount,
            } => {
                let Some(session) = state.sessions.get_mut(&correlation_id) else {
                    return Self::fail(correlation_id, ShopError::conflict("Checkout session expired"));
                };
                let total = promo::apply_discount(subtotal, discount);
                session.total = Some(total);

                if lines == 0 || total.is_zero() {
                    return Self::fail(correlation_id, ShopError::EmptyOrder);
                }
                if session.expected_total.is_some_and(|expected| expected != total) {
                    return Self::fail(correlation_id, ShopError::validation("Amount does not match cart total"));
                }

                let user_id = session.user_id.clone();
                state.advance(&correlation_id, CheckoutPhase::AwaitingPaymentGatewayOrder, now);
                smallvec![Self::request_gateway_order(correlation_id, &user_id, total, env)]
            },

            // ========== Awaiting user payment ==========
            CheckoutAction::GatewayOrderCreated {
                correlation_id, order, ..
            } => {
                metrics::counter!(names::GATEWAY_ORDERS).increment(1);
                if let Some(session) = state.sessions.get_mut(&correlation_id) {
                    session.gateway_order_id = Some(order.id);
                }
                state.advance(&correlation_id, CheckoutPhase::AwaitingUserPaymentAction, now);
                smallvec![Effect::None]
            },

            // ========== Verifying and committing ==========
            CheckoutAction::SubmitPayment {
                correlation_id,
                user_id,
                confirmation,
                address,
                items,
                total,
            } => Self::submit_payment(
                state,
                env,
                now,
                correlation_id,
                user_id,
                confirmation,
                address,
                items,
                total,
            ),

            CheckoutAction::OrderRecorded {
                correlation_id,
                order,
                replayed,
            } => {
                let caller = state.session(&correlation_id).map(|s| s.user_id.clone());
                if caller.as_ref().is_some_and(|caller| *caller != order.user_id) {
                    tracing::warn!(
                        %correlation_id,
                        gateway_payment_id = %order.gateway_payment_id,
                        "Payment id already recorded for another user"
                    );
                    return Self::fail(correlation_id, ShopError::conflict("Payment already recorded for another user"));
                }

                if let Some(session) = state.sessions.get_mut(&correlation_id) {
                    session.order_id = Some(order.id);
                }

                if order.cart_cleared {
                    smallvec![Effect::emit(CheckoutAction::CheckoutCompleted {
                        correlation_id,
                        order,
                        replayed,
                    })]
                } else {
                    smallvec![Self::clear_cart(correlation_id, order, replayed, env)]
                }
            },

            CheckoutAction::CheckoutCompleted {
                correlation_id,
                order,
                replayed,
            } => {
                if replayed {
                    metrics::counter!(names::ORDERS_REPLAYED).increment(1);
                } else {
                    metrics::counter!(names::ORDERS_COMMITTED).increment(1);
                    tracing::info!(
                        order_id = %order.id,
                        user_id = %order.user_id,
                        total = %order.total,
                        "Order committed"
                    );
                }
                state.advance(&correlation_id, CheckoutPhase::Completed, now);
                smallvec![Effect::None]
            },

            CheckoutAction::CheckoutFailed {
                correlation_id,
                failure,
            } => {
                let phase = CheckoutPhase::for_failure(&failure);
                if phase == CheckoutPhase::PersistenceFailed {
                    metrics::counter!(names::PERSISTENCE_FAILURES).increment(1);
                }
                tracing::debug!(%correlation_id, ?phase, failure = %failure, "Checkout failed");
                state.advance(&correlation_id, phase, now);
                smallvec![Effect::None]
            },
        }
    }
}

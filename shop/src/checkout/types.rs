//! Checkout state, sessions and actions.

use super::gateway::GatewayOrder;
use crate::addresses::AddressFields;
use crate::error::ShopError;
use crate::orders::{Order, OrderItem};
use crate::promo::PromoCode;
use crate::types::{Money, OrderId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Where a checkout session stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckoutPhase {
    /// Pricing the cart
    Drafting,
    /// Waiting for the gateway to mint an order
    AwaitingPaymentGatewayOrder,
    /// Gateway order handed to the client; the user is paying (or not)
    AwaitingUserPaymentAction,
    /// Checking the gateway signature
    VerifyingSignature,
    /// Writing the order and clearing the cart
    Committing,
    /// Order committed and cart cleared
    Completed,
    /// Gateway refused or could not be reached
    PaymentOrderCreationFailed,
    /// Signature mismatch
    SignatureInvalid,
    /// Order write or cart clear failed
    PersistenceFailed,
    /// Rejected before reaching the gateway or the database
    Aborted,
}

impl CheckoutPhase {
    /// True once the session can no longer advance
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed
                | Self::PaymentOrderCreationFailed
                | Self::SignatureInvalid
                | Self::PersistenceFailed
                | Self::Aborted
        )
    }

    /// Terminal phase a failure leads to
    #[must_use]
    pub const fn for_failure(failure: &ShopError) -> Self {
        match failure {
            ShopError::PaymentGateway(_) => Self::PaymentOrderCreationFailed,
            ShopError::SignatureInvalid => Self::SignatureInvalid,
            ShopError::PersistenceFailed { .. } => Self::PersistenceFailed,
            _ => Self::Aborted,
        }
    }
}

/// Server-side bookkeeping for one checkout request.
///
/// Nothing here is durable; the only durable write of a checkout is the
/// order itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CheckoutSession {
    /// Request correlation id
    pub correlation_id: Uuid,
    /// Buyer
    pub user_id: UserId,
    /// Current phase
    pub phase: CheckoutPhase,
    /// Total the client said it expects to pay
    pub expected_total: Option<Money>,
    /// Drafted total
    pub total: Option<Money>,
    /// Gateway order minted for this checkout
    pub gateway_order_id: Option<String>,
    /// Order committed by this checkout
    pub order_id: Option<OrderId>,
    /// Last phase change
    pub updated_at: DateTime<Utc>,
}

impl CheckoutSession {
    pub(crate) fn new(correlation_id: Uuid, user_id: UserId, phase: CheckoutPhase, now: DateTime<Utc>) -> Self {
        Self {
            correlation_id,
            user_id,
            phase,
            expected_total: None,
            total: None,
            gateway_order_id: None,
            order_id: None,
            updated_at: now,
        }
    }
}

/// State owned by the checkout store.
#[derive(Clone, Debug, Default)]
pub struct CheckoutState {
    /// Sessions keyed by correlation id
    pub sessions: HashMap<Uuid, CheckoutSession>,
}

impl CheckoutState {
    /// Look up a session
    #[must_use]
    pub fn session(&self, correlation_id: &Uuid) -> Option<&CheckoutSession> {
        self.sessions.get(correlation_id)
    }

    /// Number of sessions in a given phase
    #[must_use]
    pub fn count_in(&self, phase: CheckoutPhase) -> usize {
        self.sessions.values().filter(|s| s.phase == phase).count()
    }

    pub(crate) fn advance(&mut self, correlation_id: &Uuid, phase: CheckoutPhase, now: DateTime<Utc>) {
        if let Some(session) = self.sessions.get_mut(correlation_id) {
            session.phase = phase;
            session.updated_at = now;
        }
    }
}

/// What the gateway returned with a completed payment.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    /// Gateway order id
    pub gateway_order_id: String,
    /// Gateway payment id
    pub gateway_payment_id: String,
    /// Hex HMAC over `order_id|payment_id`
    pub signature: String,
}

impl PaymentConfirmation {
    /// True when any of the three fields is blank
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        [&self.gateway_order_id, &self.gateway_payment_id, &self.signature]
            .iter()
            .any(|field| field.trim().is_empty())
    }
}

/// Checkout actions: commands from handlers and the results effects feed back.
#[derive(Clone, Debug, PartialEq)]
pub enum CheckoutAction {
    // Commands
    /// Draft an order from the caller's cart and mint a gateway order for it
    StartCheckout {
        /// Request correlation id
        correlation_id: Uuid,
        /// Buyer
        user_id: UserId,
        /// Promo to apply
        promo_code: Option<PromoCode>,
        /// Total the client expects, checked against the draft
        expected_total: Option<Money>,
    },

    /// Verify a gateway payment and commit the order
    SubmitPayment {
        /// Request correlation id
        correlation_id: Uuid,
        /// Buyer
        user_id: UserId,
        /// Gateway ids and signature
        confirmation: PaymentConfirmation,
        /// Shipping address snapshot
        address: AddressFields,
        /// Line items as the client saw them
        items: Vec<OrderItem>,
        /// Amount paid
        total: Money,
    },

    // Effect results
    /// Cart priced
    DraftPriced {
        /// Request correlation id
        correlation_id: Uuid,
        /// Number of cart lines
        lines: usize,
        /// Cart total before discount
        subtotal: Money,
        /// Promo discount
        discount: Money,
    },

    /// Gateway order minted; the create-order request is done
    GatewayOrderCreated {
        /// Request correlation id
        correlation_id: Uuid,
        /// The gateway's order
        order: GatewayOrder,
        /// Key id the client needs to open the payment UI
        key_id: String,
    },

    /// Order row written (or found from an earlier attempt)
    OrderRecorded {
        /// Request correlation id
        correlation_id: Uuid,
        /// The stored order
        order: Order,
        /// Whether the order already existed
        replayed: bool,
    },

    /// Order durable and cart cleared; the verify request is done
    CheckoutCompleted {
        /// Request correlation id
        correlation_id: Uuid,
        /// The stored order
        order: Order,
        /// Whether this was a replay of an earlier commit
        replayed: bool,
    },

    /// The request failed; nothing further happens for it
    CheckoutFailed {
        /// Request correlation id
        correlation_id: Uuid,
        /// Why
        failure: ShopError,
    },
}

impl CheckoutAction {
    /// Correlation id of the request this action belongs to
    #[must_use]
    pub const fn correlation_id(&self) -> &Uuid {
        match self {
            Self::StartCheckout { correlation_id, .. }
            | Self::SubmitPayment { correlation_id, .. }
            | Self::DraftPriced { correlation_id, .. }
            | Self::GatewayOrderCreated { correlation_id, .. }
            | Self::OrderRecorded { correlation_id, .. }
            | Self::CheckoutCompleted { correlation_id, .. }
            | Self::CheckoutFailed { correlation_id, .. } => correlation_id,
        }
    }

    /// True for the action that ends the request with `correlation_id`
    #[must_use]
    pub fn is_terminal_for(&self, correlation_id: &Uuid) -> bool {
        self.correlation_id() == correlation_id
            && matches!(
                self,
                Self::GatewayOrderCreated { .. }
                    | Self::CheckoutCompleted { .. }
                    | Self::CheckoutFailed { .. }
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_map_to_terminal_phases() {
        assert_eq!(
            CheckoutPhase::for_failure(&ShopError::SignatureInvalid),
            CheckoutPhase::SignatureInvalid
        );
        assert_eq!(
            CheckoutPhase::for_failure(&ShopError::PaymentGateway("down".into())),
            CheckoutPhase::PaymentOrderCreationFailed
        );
        assert_eq!(CheckoutPhase::for_failure(&ShopError::EmptyOrder), CheckoutPhase::Aborted);
        assert!(CheckoutPhase::Aborted.is_terminal());
        assert!(!CheckoutPhase::AwaitingUserPaymentAction.is_terminal());
    }

    #[test]
    fn blank_confirmation_fields_are_incomplete() {
        let confirmation = PaymentConfirmation {
            gateway_order_id: "order_1".into(),
            gateway_payment_id: " ".into(),
            signature: "abc".into(),
        };
        assert!(confirmation.is_incomplete());
    }

    #[test]
    fn terminal_detection_respects_correlation() {
        let mine = Uuid::new_v4();
        let failed = CheckoutAction::CheckoutFailed {
            correlation_id: mine,
            failure: ShopError::EmptyOrder,
        };
        assert!(failed.is_terminal_for(&mine));
        assert!(!failed.is_terminal_for(&Uuid::new_v4()));

        let priced = CheckoutAction::DraftPriced {
            correlation_id: mine,
            lines: 1,
            subtotal: Money::ZERO,
            discount: Money::ZERO,
        };
        assert!(!priced.is_terminal_for(&mine));
    }
}

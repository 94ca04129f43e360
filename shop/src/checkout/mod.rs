//! Cart to paid order.
//!
//! A [`CheckoutStore`] runs the [`CheckoutReducer`]; [`Checkout`] wraps it in
//! the two request/response calls the HTTP layer needs, waiting on the
//! store's action broadcast for the terminal action of each request.

pub mod gateway;
pub mod reducer;
pub mod signature;
pub mod types;

pub use gateway::{
    GatewayOrder, GatewayOrderRequest, MockPaymentGateway, PaymentGateway, PaymentGatewayError,
    RazorpayGateway,
};
pub use reducer::{CheckoutEnvironment, CheckoutReducer, CheckoutSettings};
pub use types::{CheckoutAction, CheckoutPhase, CheckoutSession, CheckoutState, PaymentConfirmation};

use crate::addresses::AddressFields;
use crate::error::{Result, ShopError};
use crate::orders::{Order, OrderItem};
use crate::promo::PromoCode;
use crate::types::{Money, UserId};
use std::sync::Arc;
use std::time::Duration;
use storefront_runtime::{HealthCheck, Store, StoreError};
use uuid::Uuid;

/// Store running the checkout reducer
pub type CheckoutStore = Store<CheckoutState, CheckoutAction, CheckoutEnvironment, CheckoutReducer>;

/// Concurrent checkouts each hold one broadcast observer.
const BROADCAST_CAPACITY: usize = 256;

/// Gateway order handed to the client so it can open the payment UI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentIntent {
    /// The gateway's order
    pub order: GatewayOrder,
    /// Public key id for the gateway UI
    pub key_id: String,
}

/// Order produced by a verified payment.
#[derive(Clone, Debug, PartialEq)]
pub struct CommittedOrder {
    /// The stored order
    pub order: Order,
    /// True when an earlier request already recorded this payment
    pub replayed: bool,
}

/// Everything the verify step receives from the client.
#[derive(Clone, Debug)]
pub struct VerifiedPayment {
    /// Gateway ids and signature
    pub confirmation: PaymentConfirmation,
    /// Shipping address snapshot
    pub address: AddressFields,
    /// Line items
    pub items: Vec<OrderItem>,
    /// Amount paid
    pub total: Money,
}

/// Request/response facade over the checkout store.
#[derive(Clone)]
pub struct Checkout {
    store: Arc<CheckoutStore>,
    gateway: Arc<dyn PaymentGateway>,
    timeout: Duration,
}

impl Checkout {
    /// Start a checkout store over `env`.
    ///
    /// `timeout` bounds how long one request waits for its terminal action.
    #[must_use]
    pub fn new(env: CheckoutEnvironment, timeout: Duration) -> Self {
        let gateway = Arc::clone(&env.gateway);
        let store = Store::with_broadcast_capacity(
            CheckoutState::default(),
            CheckoutReducer::new(),
            env,
            BROADCAST_CAPACITY,
        );
        Self {
            store: Arc::new(store),
            gateway,
            timeout,
        }
    }

    /// The underlying store
    #[must_use]
    pub fn store(&self) -> Arc<CheckoutStore> {
        Arc::clone(&self.store)
    }

    /// Store health for readiness probes
    #[must_use]
    pub fn health(&self) -> HealthCheck {
        self.store.health()
    }

    /// Draft the caller's cart and mint a gateway order for the total.
    ///
    /// # Errors
    ///
    /// `EmptyOrder`, `Validation` on an amount mismatch, promo errors,
    /// `PaymentGateway` when the gateway refuses, or a store failure.
    #[tracing::instrument(skip(self, user_id, promo_code, expected_total), fields(user_id = %user_id))]
    pub async fn create_order(
        &self,
        correlation_id: Uuid,
        user_id: UserId,
        promo_code: Option<PromoCode>,
        expected_total: Option<Money>,
    ) -> Result<PaymentIntent> {
        let action = CheckoutAction::StartCheckout {
            correlation_id,
            user_id,
            promo_code,
            expected_total,
        };
        match self.run(correlation_id, action).await? {
            CheckoutAction::GatewayOrderCreated { order, key_id, .. } => Ok(PaymentIntent { order, key_id }),
            CheckoutAction::CheckoutFailed { failure, .. } => Err(failure),
            other => Err(unexpected(&other)),
        }
    }

    /// Verify a completed payment, record the order and clear the cart.
    ///
    /// # Errors
    ///
    /// `Validation` on missing fields, `SignatureInvalid`, `EmptyOrder`,
    /// `Conflict` when another user already recorded the payment,
    /// `PersistenceFailed`, or a store failure.
    #[tracing::instrument(skip(self, user_id, payment), fields(user_id = %user_id))]
    pub async fn verify_and_save(
        &self,
        correlation_id: Uuid,
        user_id: UserId,
        payment: VerifiedPayment,
    ) -> Result<CommittedOrder> {
        let action = CheckoutAction::SubmitPayment {
            correlation_id,
            user_id,
            confirmation: payment.confirmation,
            address: payment.address,
            items: payment.items,
            total: payment.total,
        };
        match self.run(correlation_id, action).await? {
            CheckoutAction::CheckoutCompleted { order, replayed, .. } => Ok(CommittedOrder { order, replayed }),
            CheckoutAction::CheckoutFailed { failure, .. } => Err(failure),
            other => Err(unexpected(&other)),
        }
    }

    /// Reject a complete confirmation whose signature does not match,
    /// without touching the store. Incomplete confirmations pass.
    ///
    /// # Errors
    ///
    /// `SignatureInvalid` on a mismatch.
    pub fn check_signature(
        &self,
        correlation_id: Uuid,
        user_id: &UserId,
        confirmation: &PaymentConfirmation,
    ) -> Result<()> {
        if confirmation.is_incomplete()
            || reducer::signature_matches(self.gateway.as_ref(), correlation_id, user_id, confirmation)
        {
            Ok(())
        } else {
            Err(ShopError::SignatureInvalid)
        }
    }

    /// Phase of a session, if it is still retained
    pub async fn phase(&self, correlation_id: Uuid) -> Option<CheckoutPhase> {
        self.store
            .state(|state| state.session(&correlation_id).map(|session| session.phase))
            .await
    }

    /// Stop accepting checkouts and wait for in-flight effects.
    ///
    /// # Errors
    ///
    /// Returns error if effects are still running after `timeout`
    pub async fn shutdown(&self, timeout: Duration) -> std::result::Result<(), StoreError> {
        self.store.shutdown(timeout).await
    }

    async fn run(&self, correlation_id: Uuid, action: CheckoutAction) -> Result<CheckoutAction> {
        self.store
            .send_and_wait_for(
                action,
                move |candidate| candidate.is_terminal_for(&correlation_id),
                self.timeout,
            )
            .await
            .map_err(ShopError::from)
    }
}

fn unexpected(action: &CheckoutAction) -> ShopError {
    tracing::error!(?action, "Checkout ended on an unexpected action");
    ShopError::Storage("checkout ended unexpectedly".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::ledger::{InMemoryLedger, InventoryLedger, NewProduct};
    use crate::orders::InMemoryOrderRepository;
    use crate::promo::InMemoryPromoStore;
    use storefront_testing::mocks::{epoch, test_clock};

    fn checkout(ledger: Arc<InMemoryLedger>, gateway: MockPaymentGateway) -> Checkout {
        Checkout::new(
            CheckoutEnvironment {
                ledger,
                promos: Arc::new(InMemoryPromoStore::new()),
                orders: Arc::new(InMemoryOrderRepository::new()),
                gateway: Arc::new(gateway),
                clock: Arc::new(test_clock()),
                settings: CheckoutSettings::default(),
            },
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn create_order_then_verify_through_the_store() {
        let ledger = InMemoryLedger::shared();
        let gateway = MockPaymentGateway::new("secret");
        let checkout = checkout(Arc::clone(&ledger), gateway.clone());

        let product = ledger
            .add_product(
                NewProduct {
                    name: "Lamp".into(),
                    image: String::new(),
                    category: "home".into(),
                    brand: "Generic".into(),
                    new_price: Money::from_major(40).unwrap(),
                    old_price: Money::from_major(40).unwrap(),
                    description: String::new(),
                    stock: 3,
                    available: true,
                },
                epoch(),
            )
            .await
            .unwrap();
        let bob = UserId::new("bob");
        ledger.reserve(&bob, product.id).await.unwrap();

        let correlation_id = Uuid::new_v4();
        let intent = checkout
            .create_order(correlation_id, bob.clone(), None, None)
            .await
            .unwrap();
        assert_eq!(intent.order.amount, 4_000);
        assert_eq!(
            checkout.phase(correlation_id).await,
            Some(CheckoutPhase::AwaitingUserPaymentAction)
        );

        let payment = VerifiedPayment {
            confirmation: PaymentConfirmation {
                gateway_order_id: intent.order.id.clone(),
                gateway_payment_id: "pay_42".into(),
                signature: gateway.sign(&intent.order.id, "pay_42"),
            },
            address: AddressFields::default(),
            items: Vec::new(),
            total: Money::from_major(40).unwrap(),
        };
        // No line items is an empty order even with a valid signature.
        let err = checkout
            .verify_and_save(Uuid::new_v4(), bob.clone(), payment.clone())
            .await
            .unwrap_err();
        assert_eq!(err, ShopError::EmptyOrder);

        let payment = VerifiedPayment {
            items: vec![OrderItem {
                id: product.id,
                name: "Lamp".into(),
                price: Money::from_major(40).unwrap(),
                quantity: 1,
                image: String::new(),
            }],
            ..payment
        };
        let committed = checkout.verify_and_save(Uuid::new_v4(), bob.clone(), payment).await.unwrap();
        assert!(!committed.replayed);
        assert!(ledger.cart(&bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn signature_check_stands_alone() {
        let gateway = MockPaymentGateway::new("secret");
        let checkout = checkout(InMemoryLedger::shared(), gateway.clone());
        let bob = UserId::new("bob");
        let mut confirmation = PaymentConfirmation {
            gateway_order_id: "order_1".into(),
            gateway_payment_id: "pay_1".into(),
            signature: gateway.sign("order_1", "pay_1"),
        };
        assert!(checkout.check_signature(Uuid::new_v4(), &bob, &confirmation).is_ok());

        confirmation.signature = "forged".into();
        assert_eq!(
            checkout.check_signature(Uuid::new_v4(), &bob, &confirmation),
            Err(ShopError::SignatureInvalid)
        );

        confirmation.signature = String::new();
        assert!(checkout.check_signature(Uuid::new_v4(), &bob, &confirmation).is_ok());
    }

    #[tokio::test]
    async fn shutdown_rejects_new_checkouts() {
        let checkout = checkout(InMemoryLedger::shared(), MockPaymentGateway::new("secret"));
        checkout.shutdown(Duration::from_millis(100)).await.unwrap();
        let err = checkout
            .create_order(Uuid::new_v4(), UserId::new("bob"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::Unavailable(_)));
    }
}

pub mod cart;
pub mod checkout;
pub mod common;
pub mod orders;
pub mod payment_callback;
pub mod payment_functions;
pub mod payment_webhooks;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::{
    config::AppConfig,
    events::EventSender,
    repositories::{
        CartRepository, CartStore, OrderRepository, OrderStore, ReconciliationRepository,
        ReconciliationStore,
    },
    services::{
        commerce::{CartService, CheckoutService},
        payments::{
            PaymentGateway, PaymentInitiationService, PaymentVerificationService, WebhookVerifier,
        },
    },
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<dyn OrderStore>,
    pub initiation: Arc<PaymentInitiationService>,
    pub verification: Arc<PaymentVerificationService>,
    pub webhook: Arc<WebhookVerifier>,
}

impl AppServices {
    /// Wires the database-backed repositories and the given gateway into the services.
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        gateway: Arc<dyn PaymentGateway>,
        config: &AppConfig,
    ) -> Self {
        let carts: Arc<dyn CartStore> = Arc::new(CartRepository::new(db.clone()));
        let orders: Arc<dyn OrderStore> = Arc::new(OrderRepository::new(db.clone()));
        let reconciliations: Arc<dyn ReconciliationStore> =
            Arc::new(ReconciliationRepository::new(db));

        let initiation = Arc::new(PaymentInitiationService::new(
            gateway.clone(),
            carts.clone(),
            event_sender.clone(),
            config.payment_amount_ceiling_minor,
            config.payment_callback_path.clone(),
        ));
        let verification = Arc::new(PaymentVerificationService::new(
            gateway,
            orders.clone(),
            carts.clone(),
            reconciliations,
            event_sender.clone(),
            config.currency.clone(),
        ));
        let cart = Arc::new(CartService::new(carts.clone(), event_sender.clone()));
        let checkout = Arc::new(CheckoutService::new(
            carts,
            orders.clone(),
            initiation.clone(),
            event_sender,
            config.currency.clone(),
        ));

        Self {
            cart,
            checkout,
            orders,
            initiation,
            verification,
            webhook: Arc::new(WebhookVerifier::new(config.paystack_secret_key.clone())),
        }
    }
}

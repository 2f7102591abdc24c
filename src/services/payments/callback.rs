//! Buyer return from the gateway.
//!
//! Models the `loading -> success | failed` state machine the storefront runs
//! when the gateway redirects back with `?reference=...`. Side effects on the
//! buyer's view (clearing the local cart, navigating) go through the
//! [`CartView`] and [`Navigator`] seams so the machine can drive a browser, a
//! server-rendered page or a test double alike.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::types::VerificationOutcome;
use super::verification::PaymentVerificationService;
use crate::errors::ServiceError;

pub const CART_PATH: &str = "/cart";
pub const ORDERS_PATH: &str = "/customer/orders";
pub const MSG_NO_REFERENCE: &str = "No payment reference found";
pub const MSG_VERIFY_ERROR: &str = "Failed to verify payment. Please contact support.";

/// Where the buyer lands after a successful payment
pub fn confirmation_path(order_id: Option<Uuid>) -> String {
    match order_id {
        Some(id) => format!("{}?success=true&orderId={}", CART_PATH, id),
        None => format!("{}?success=true", CART_PATH),
    }
}

#[async_trait]
pub trait VerificationClient: Send + Sync {
    async fn verify(&self, reference: &str) -> Result<VerificationOutcome, ServiceError>;
}

#[async_trait]
impl VerificationClient for PaymentVerificationService {
    async fn verify(&self, reference: &str) -> Result<VerificationOutcome, ServiceError> {
        PaymentVerificationService::verify(self, Some(reference)).await
    }
}

/// Buyer-side cart state
pub trait CartView: Send + Sync {
    fn clear(&self);
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, target: &str);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CallbackStatus {
    Loading,
    Success,
    Failed,
}

/// What the callback view shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CallbackView {
    pub status: CallbackStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<Uuid>,
    /// Automatic navigation target, success only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_after_ms: Option<u64>,
    /// Manual navigation targets offered to the buyer
    pub links: Vec<String>,
}

impl CallbackView {
    fn loading(reference: Option<String>) -> Self {
        Self {
            status: CallbackStatus::Loading,
            message: "Verifying payment".to_string(),
            reference,
            order_id: None,
            redirect_to: None,
            redirect_after_ms: None,
            links: Vec::new(),
        }
    }

    fn failed(reference: Option<String>, message: impl Into<String>) -> Self {
        Self {
            status: CallbackStatus::Failed,
            message: message.into(),
            reference,
            order_id: None,
            redirect_to: None,
            redirect_after_ms: None,
            links: vec![CART_PATH.to_string(), ORDERS_PATH.to_string()],
        }
    }
}

/// One run of the callback state machine. Terminal states are final: a second
/// `run` returns the same view without calling verification again.
pub struct PaymentCallback {
    verifier: Arc<dyn VerificationClient>,
    cart_view: Arc<dyn CartView>,
    navigator: Arc<dyn Navigator>,
    redirect_delay: Duration,
    view: CallbackView,
    pending_redirect: Option<JoinHandle<()>>,
}

impl PaymentCallback {
    pub fn new(
        verifier: Arc<dyn VerificationClient>,
        cart_view: Arc<dyn CartView>,
        navigator: Arc<dyn Navigator>,
        redirect_delay: Duration,
    ) -> Self {
        Self {
            verifier,
            cart_view,
            navigator,
            redirect_delay,
            view: CallbackView::loading(None),
            pending_redirect: None,
        }
    }

    pub fn view(&self) -> &CallbackView {
        &self.view
    }

    /// Handle for the delayed navigation scheduled on success
    pub fn take_pending_redirect(&mut self) -> Option<JoinHandle<()>> {
        self.pending_redirect.take()
    }

    pub async fn run(&mut self, reference: Option<&str>) -> &CallbackView {
        if self.view.status != CallbackStatus::Loading {
            return &self.view;
        }

        let Some(reference) = reference.map(str::trim).filter(|r| !r.is_empty()) else {
            warn!("Callback reached without a payment reference");
            self.view = CallbackView::failed(None, MSG_NO_REFERENCE);
            return &self.view;
        };
        let reference_owned = Some(reference.to_string());
        self.view = CallbackView::loading(reference_owned.clone());

        self.view = match self.verifier.verify(reference).await {
            Ok(VerificationOutcome::Success {
                message, order_id, ..
            }) => {
                self.cart_view.clear();
                let target = confirmation_path(Some(order_id));
                self.schedule_redirect(target.clone());
                info!(reference, order_id = %order_id, "Payment callback succeeded");
                CallbackView {
                    status: CallbackStatus::Success,
                    message,
                    reference: reference_owned,
                    order_id: Some(order_id),
                    redirect_to: Some(target),
                    redirect_after_ms: Some(self.redirect_delay.as_millis() as u64),
                    links: vec![CART_PATH.to_string()],
                }
            }
            Ok(VerificationOutcome::Failed { message }) => {
                let message = if message.trim().is_empty() {
                    "Payment verification failed".to_string()
                } else {
                    message
                };
                CallbackView::failed(reference_owned, message)
            }
            Err(e) => {
                warn!(reference, "Payment verification error: {}", e);
                CallbackView::failed(reference_owned, MSG_VERIFY_ERROR)
            }
        };

        &self.view
    }

    fn schedule_redirect(&mut self, target: String) {
        let navigator = Arc::clone(&self.navigator);
        let delay = self.redirect_delay;
        self.pending_redirect = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(%target, "Navigating after payment");
            navigator.navigate(&target);
        }));
    }
}

/// Cart view for server-side callbacks: the buyer's browser owns its cart state
/// and the server already cleared the stored cart during verification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCartView;

impl CartView for NoopCartView {
    fn clear(&self) {}
}

/// Navigator for server-side callbacks; the view carries the target instead.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, _target: &str) {}
}

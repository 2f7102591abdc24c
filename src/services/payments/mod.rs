//! Online payment flow: initiation, gateway verification, the buyer callback
//! state machine and webhook signatures.

pub mod callback;
pub mod gateway;
pub mod initiation;
pub mod types;
pub mod verification;
pub mod webhook;

pub use callback::{CallbackStatus, CallbackView, PaymentCallback};
pub use gateway::{PaymentGateway, PaystackGateway};
pub use initiation::PaymentInitiationService;
pub use types::{
    InitiatePaymentRequest, PaymentAuthorization, PendingOrderPayload, VerificationOutcome,
    VerifyPaymentRequest,
};
pub use verification::PaymentVerificationService;
pub use webhook::WebhookVerifier;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;

use crate::{
    services::payments::{
        callback::{NoopCartView, NoopNavigator, VerificationClient},
        CallbackView, PaymentCallback,
    },
    AppState,
};

pub fn payment_callback_routes(path: &str) -> Router<AppState> {
    Router::new().route(path, get(payment_callback))
}

/// Query string the gateway appends when sending the buyer back
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct CallbackQuery {
    pub reference: Option<String>,
    /// Paystack also sends the reference under this name
    pub trxref: Option<String>,
}

impl CallbackQuery {
    /// First non-blank of `reference` and `trxref`
    pub fn reference(&self) -> Option<&str> {
        fn present(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.trim().is_empty())
        }
        present(&self.reference).or_else(|| present(&self.trxref))
    }
}

/// Buyer return from the gateway.
///
/// Runs the callback state machine against the in-process verification
/// service and returns its terminal view. The browser performs the delayed
/// navigation itself using `redirect_to` and `redirect_after_ms`.
#[utoipa::path(
    get,
    path = "/payment/callback",
    params(CallbackQuery),
    responses((status = 200, description = "Terminal callback view", body = CallbackView)),
    tag = "Payments"
)]
pub async fn payment_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> impl IntoResponse {
    let verifier: Arc<dyn VerificationClient> = state.services.verification.clone();
    let mut callback = PaymentCallback::new(
        verifier,
        Arc::new(NoopCartView),
        Arc::new(NoopNavigator),
        state.config.callback_redirect_delay(),
    );

    let view = callback.run(query.reference()).await.clone();
    if let Some(redirect) = callback.take_pending_redirect() {
        redirect.abort();
    }

    Json(view)
}

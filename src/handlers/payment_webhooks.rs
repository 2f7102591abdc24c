use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use serde_json::json;
use tracing::{info, warn};

use crate::{
    errors::ServiceError,
    services::payments::webhook::{WebhookEvent, CHARGE_SUCCESS, SIGNATURE_HEADER},
    AppState,
};

pub fn payment_webhook_routes() -> Router<AppState> {
    Router::new().route("/webhooks/paystack", post(paystack_webhook))
}

// POST /webhooks/paystack
#[utoipa::path(
    post,
    path = "/webhooks/paystack",
    request_body = String,
    responses(
        (status = 200, description = "Webhook accepted"),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn paystack_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !state.services.webhook.verify(&body, signature) {
        warn!("Payment webhook signature verification failed");
        return Err(ServiceError::Unauthorized(
            "invalid webhook signature".to_string(),
        ));
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::ValidationError(format!("invalid json: {}", e)))?;

    if event.event != CHARGE_SUCCESS {
        info!("Unhandled payment webhook type: {}", event.event);
        return Ok((StatusCode::OK, Json(json!({ "received": true }))));
    }

    let Some(reference) = event.data.reference else {
        warn!("charge.success webhook without a reference");
        return Err(ServiceError::ValidationError(
            "Webhook event carries no reference".to_string(),
        ));
    };

    // Same path as the buyer's return; replays of an already verified reference are no-ops
    let outcome = state
        .services
        .verification
        .verify(Some(&reference))
        .await?;
    info!(
        reference = %reference,
        success = outcome.is_success(),
        "Processed charge.success webhook: {}",
        outcome.message()
    );

    Ok((
        StatusCode::OK,
        Json(json!({ "received": true, "status": if outcome.is_success() { "success" } else { "failed" } })),
    ))
}

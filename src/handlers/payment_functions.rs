//! The two payment functions the storefront calls directly.
//!
//! Their bodies follow a fixed contract rather than the standard API error
//! shape: initiation answers `{error, details?}` on failure, verification
//! answers HTTP 200 with a `status` field for every logical outcome.

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Extension, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::handlers::common::request_origin;
use crate::{
    auth::AuthenticatedUser,
    errors::ServiceError,
    services::payments::{
        InitiatePaymentRequest, PaymentAuthorization, VerificationOutcome, VerifyPaymentRequest,
    },
    AppState,
};

/// Authenticated initiation route
pub fn process_payment_routes() -> Router<AppState> {
    Router::new().route("/process-payment", post(process_payment))
}

/// Unauthenticated verification route; every effect derives from gateway data
pub fn verify_payment_routes() -> Router<AppState> {
    Router::new().route("/verify-payment", post(verify_payment))
}

/// Failure body of the payment functions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FunctionError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Unexpected verification failure body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VerificationFailure {
    pub status: String,
    pub message: String,
    pub details: String,
}

fn function_error(status: StatusCode, error: impl Into<String>, details: Option<String>) -> Response {
    (
        status,
        Json(FunctionError {
            error: error.into(),
            details,
        }),
    )
        .into_response()
}

/// Maps a service error to the initiation contract
pub fn initiation_error_response(err: ServiceError) -> Response {
    match err {
        ServiceError::ValidationError(message) => {
            function_error(StatusCode::BAD_REQUEST, message, None)
        }
        ServiceError::FieldValidation(_) => {
            function_error(StatusCode::BAD_REQUEST, "Validation failed", None)
        }
        ServiceError::GatewayError(message) => function_error(
            StatusCode::BAD_REQUEST,
            "Payment initialization failed",
            Some(message),
        ),
        ServiceError::Forbidden(message) => function_error(StatusCode::FORBIDDEN, message, None),
        ServiceError::Unauthorized(message) => {
            function_error(StatusCode::UNAUTHORIZED, message, None)
        }
        other => {
            error!("Payment initialization error: {}", other);
            function_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error",
                Some(other.response_message()),
            )
        }
    }
}

/// Open a gateway transaction for a checkout
#[utoipa::path(
    post,
    path = "/functions/v1/process-payment",
    request_body = InitiatePaymentRequest,
    responses(
        (status = 200, description = "Gateway transaction opened", body = PaymentAuthorization),
        (status = 400, description = "Validation failure or gateway rejection", body = FunctionError),
        (status = 403, description = "Order data belongs to another buyer", body = FunctionError),
        (status = 500, description = "Unexpected failure", body = FunctionError)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn process_payment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    headers: HeaderMap,
    body: Result<Json<InitiatePaymentRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Unreadable payment request: {}", rejection);
            return function_error(
                StatusCode::BAD_REQUEST,
                "Invalid request body",
                Some(rejection.body_text()),
            );
        }
    };

    let origin = request_origin(&headers, &state.config);
    match state
        .services
        .initiation
        .initiate(user.user_id, request, origin.as_deref())
        .await
    {
        Ok(authorization) => (StatusCode::OK, Json(authorization)).into_response(),
        Err(err) => initiation_error_response(err),
    }
}

/// Confirm a payment and materialize its orders
#[utoipa::path(
    post,
    path = "/functions/v1/verify-payment",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Terminal verification result", body = VerificationOutcome),
        (status = 400, description = "Reference missing", body = FunctionError),
        (status = 500, description = "Unexpected failure", body = VerificationFailure)
    ),
    tag = "Payments"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    body: Result<Json<VerifyPaymentRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Unreadable verification request: {}", rejection);
            VerifyPaymentRequest::default()
        }
    };

    match state
        .services
        .verification
        .verify(request.reference.as_deref())
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(ServiceError::ValidationError(message)) => {
            function_error(StatusCode::BAD_REQUEST, message, None)
        }
        Err(err) => {
            error!("Payment verification error: {}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(VerificationFailure {
                    status: "failed".to_string(),
                    message: "Internal server error".to_string(),
                    details: err.response_message(),
                }),
            )
                .into_response()
        }
    }
}

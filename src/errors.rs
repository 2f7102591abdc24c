use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Standard error body returned by the REST surface
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Bad Request",
    "message": "Validation error: Cart is empty",
    "request_id": "req-abc123xyz",
    "timestamp": "2024-12-09T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Additional error details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Per-field validation messages, keyed by field name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, String>>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// RFC 3339 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Malformed or missing input, caught before any external call.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Form-level validation with one message per offending field.
    #[error("Validation failed for {} field(s)", .0.len())]
    FieldValidation(BTreeMap<String, String>),

    /// The payment provider rejected or failed the request.
    #[error("Gateway error: {0}")]
    GatewayError(String),

    /// The data store rejected a read or write.
    #[error("Database error: {0}")]
    PersistenceError(#[from] DbErr),

    /// Payment confirmed by the gateway but no order could be recorded.
    #[error("Payment anomaly: {0}")]
    AnomalyError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        let mut fields = BTreeMap::new();
        for (field, errors) in err.field_errors() {
            let message = errors
                .iter()
                .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| format!("{} is invalid", field));
            fields.insert(field.to_string(), message);
        }
        ServiceError::FieldValidation(fields)
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::SerializationError(err.to_string())
    }
}

impl ServiceError {
    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) | Self::FieldValidation(_) => StatusCode::BAD_REQUEST,
            Self::GatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::PersistenceError(_)
            | Self::AnomalyError(_)
            | Self::SerializationError(_)
            | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::PersistenceError(_) => "Database error".to_string(),
            Self::SerializationError(_) | Self::InternalError(_) => {
                "Internal server error".to_string()
            }
            Self::AnomalyError(_) => {
                "Payment received but the order could not be recorded".to_string()
            }
            Self::FieldValidation(_) => "Validation failed".to_string(),
            _ => self.to_string(),
        }
    }

    /// Per-field messages of a form validation failure
    pub fn field_errors(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::FieldValidation(fields) => Some(fields),
            _ => None,
        }
    }

    /// Whether the error was raised before any external side effect.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::ValidationError(_) | Self::FieldValidation(_))
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.response_message();
        let fields = match self {
            ServiceError::FieldValidation(fields) => Some(fields),
            _ => None,
        };

        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message,
            details: None,
            fields,
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

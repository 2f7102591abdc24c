//! Payment gateway seam and the Paystack implementation.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::types::PaymentAuthorization;
use crate::entities::order::PaymentMethod;
use crate::errors::ServiceError;

/// Transaction opening request sent to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayInitRequest {
    pub amount: i64,
    pub email: String,
    pub reference: String,
    pub callback_url: String,
    pub metadata: GatewayMetadata,
}

/// Opaque metadata stored with the transaction and echoed back on verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayMetadata {
    /// Serialized pending order payload
    pub order_data: String,
}

/// Transaction state as reported by the gateway's verification endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GatewayTransaction {
    pub status: String,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub gateway_response: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl GatewayTransaction {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// The order payload as it was embedded at initiation. Returned as text even
    /// when the gateway decoded it into an object.
    pub fn order_data(&self) -> Option<String> {
        match self.metadata.as_ref()?.get("order_data")? {
            serde_json::Value::String(raw) if !raw.trim().is_empty() => Some(raw.clone()),
            serde_json::Value::Null | serde_json::Value::String(_) => None,
            other => Some(other.to_string()),
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Payment method recorded on orders paid through this gateway
    fn method(&self) -> PaymentMethod;

    /// Opens a transaction. Rejections surface as `ServiceError::GatewayError`
    /// carrying the gateway's own message.
    async fn initialize(
        &self,
        request: &GatewayInitRequest,
    ) -> Result<PaymentAuthorization, ServiceError>;

    /// Fetches the final state of a transaction
    async fn verify(&self, reference: &str) -> Result<GatewayTransaction, ServiceError>;
}

/// Paystack response envelope
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

/// Paystack REST client
#[derive(Debug, Clone)]
pub struct PaystackGateway {
    client: reqwest::Client,
    base_url: Url,
    secret_key: String,
}

impl PaystackGateway {
    pub fn new(
        base_url: &str,
        secret_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ServiceError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ServiceError::InternalError(format!("Invalid gateway URL: {}", e)))?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ServiceError::InternalError(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            secret_key: secret_key.into(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ServiceError::InternalError("Gateway URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Decodes the envelope regardless of HTTP status; Paystack explains rejections in the body.
    async fn read_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
        fallback: &str,
    ) -> Result<T, ServiceError> {
        let status = response.status();
        let envelope = response.json::<Envelope<T>>().await.map_err(|e| {
            error!(http_status = %status, "Unreadable gateway response: {}", e);
            ServiceError::GatewayError(fallback.to_string())
        })?;

        if !status.is_success() || !envelope.status {
            let message = envelope
                .message
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| fallback.to_string());
            warn!(http_status = %status, "Gateway rejected request: {}", message);
            return Err(ServiceError::GatewayError(message));
        }

        envelope.data.ok_or_else(|| {
            error!(http_status = %status, "Gateway response carried no data");
            ServiceError::GatewayError(fallback.to_string())
        })
    }
}

#[async_trait]
impl PaymentGateway for PaystackGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Paystack
    }

    #[instrument(skip(self, request), fields(reference = %request.reference, amount = request.amount))]
    async fn initialize(
        &self,
        request: &GatewayInitRequest,
    ) -> Result<PaymentAuthorization, ServiceError> {
        let url = self.endpoint(&["transaction", "initialize"])?;
        debug!(%url, "Initializing gateway transaction");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.secret_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!("Gateway initialize request failed: {}", e);
                ServiceError::GatewayError("Payment gateway unreachable".to_string())
            })?;

        let authorization: PaymentAuthorization =
            Self::read_envelope(response, "Payment initialization failed").await?;
        info!("Gateway transaction initialized");
        Ok(authorization)
    }

    #[instrument(skip(self))]
    async fn verify(&self, reference: &str) -> Result<GatewayTransaction, ServiceError> {
        let url = self.endpoint(&["transaction", "verify", reference])?;

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| {
                error!("Gateway verify request failed: {}", e);
                ServiceError::GatewayError("Payment verification failed".to_string())
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Gateway does not know this reference");
        }

        Self::read_envelope(response, "Payment verification failed").await
    }
}

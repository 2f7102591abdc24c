use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::gateway::{GatewayInitRequest, GatewayMetadata, PaymentGateway};
use super::types::{InitiatePaymentRequest, PaymentAuthorization, PendingOrderPayload};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::repositories::CartStore;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

/// Basic email shape check shared with the checkout form
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// A fully validated initiation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedInitiation {
    pub amount: i64,
    pub email: String,
    pub reference: String,
    pub order: PendingOrderPayload,
}

/// Opens gateway transactions for validated checkouts. Nothing is persisted
/// locally; the gateway holds the order intent until verification.
#[derive(Clone)]
pub struct PaymentInitiationService {
    gateway: Arc<dyn PaymentGateway>,
    catalog: Arc<dyn CartStore>,
    event_sender: Arc<EventSender>,
    amount_ceiling_minor: i64,
    callback_path: String,
}

impl PaymentInitiationService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        catalog: Arc<dyn CartStore>,
        event_sender: Arc<EventSender>,
        amount_ceiling_minor: i64,
        callback_path: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            catalog,
            event_sender,
            amount_ceiling_minor,
            callback_path: callback_path.into(),
        }
    }

    /// Validates the shape of a raw request and the internal consistency of its
    /// order data. Never touches the network or the catalog.
    pub fn validate(
        &self,
        request: InitiatePaymentRequest,
    ) -> Result<ValidatedInitiation, ServiceError> {
        let non_blank = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        let (Some(amount), Some(email), Some(reference), Some(order_data)) = (
            request.amount,
            non_blank(request.email),
            non_blank(request.reference),
            request.order_data.filter(|v| !v.is_null()),
        ) else {
            return Err(ServiceError::ValidationError(
                "Missing required fields".to_string(),
            ));
        };

        if !is_valid_email(&email) {
            return Err(ServiceError::ValidationError(
                "Invalid email format".to_string(),
            ));
        }

        let amount = amount
            .as_i64()
            .filter(|a| *a > 0 && *a <= self.amount_ceiling_minor)
            .ok_or_else(|| ServiceError::ValidationError("Invalid amount".to_string()))?;

        let order: PendingOrderPayload = serde_json::from_value(order_data)
            .map_err(|e| ServiceError::ValidationError(format!("Invalid order data: {}", e)))?;

        order
            .check_totals()
            .map_err(|e| ServiceError::ValidationError(format!("Invalid order data: {}", e)))?;

        if order.total_amount_minor != amount {
            return Err(ServiceError::ValidationError(
                "Amount does not match order total".to_string(),
            ));
        }

        Ok(ValidatedInitiation {
            amount,
            email,
            reference,
            order,
        })
    }

    /// Re-prices every line from the catalog. The product must exist, be active,
    /// belong to the vendor it is filed under and still cost what the line says.
    pub async fn check_catalog(&self, order: &PendingOrderPayload) -> Result<(), ServiceError> {
        let invalid = |message: String| {
            ServiceError::ValidationError(format!("Invalid order data: {}", message))
        };

        for vendor in &order.vendors {
            for line in &vendor.lines {
                let product = self
                    .catalog
                    .find_product(line.product_id)
                    .await?
                    .ok_or_else(|| invalid(format!("unknown product {}", line.product_id)))?;

                if !product.is_active {
                    return Err(invalid(format!(
                        "product {} is no longer available",
                        product.id
                    )));
                }
                if product.vendor_id != vendor.vendor_id {
                    return Err(invalid(format!(
                        "product {} is not sold by vendor {}",
                        product.id, vendor.vendor_id
                    )));
                }
                if product.price_minor != line.unit_price_minor {
                    warn!(
                        product_id = %product.id,
                        catalog_price = product.price_minor,
                        submitted_price = line.unit_price_minor,
                        "Order data price differs from catalog"
                    );
                    return Err(invalid(format!(
                        "price of product {} does not match the catalog",
                        product.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Full gate: request validation followed by the catalog check
    pub async fn prepare(
        &self,
        request: InitiatePaymentRequest,
    ) -> Result<ValidatedInitiation, ServiceError> {
        let validated = self.validate(request)?;
        self.check_catalog(&validated.order).await?;
        Ok(validated)
    }

    /// Validates and opens a gateway transaction on behalf of `caller`.
    ///
    /// `origin` is the scheme and host the buyer's browser should return to.
    #[instrument(skip(self, request, origin), fields(caller = %caller))]
    pub async fn initiate(
        &self,
        caller: Uuid,
        request: InitiatePaymentRequest,
        origin: Option<&str>,
    ) -> Result<PaymentAuthorization, ServiceError> {
        let validated = self.validate(request)?;

        if validated.order.customer_id != caller {
            warn!(customer_id = %validated.order.customer_id, "Order data belongs to another buyer");
            return Err(ServiceError::Forbidden(
                "Order data does not belong to the authenticated buyer".to_string(),
            ));
        }

        self.check_catalog(&validated.order).await?;

        let origin = origin
            .map(|o| o.trim_end_matches('/'))
            .filter(|o| !o.is_empty())
            .ok_or_else(|| {
                ServiceError::ValidationError("Unable to determine callback origin".to_string())
            })?;

        self.open_transaction(validated, origin).await
    }

    /// Opens the gateway transaction for an already validated request
    pub async fn open_transaction(
        &self,
        validated: ValidatedInitiation,
        origin: &str,
    ) -> Result<PaymentAuthorization, ServiceError> {
        let ValidatedInitiation {
            amount,
            email,
            reference,
            order,
        } = validated;

        let customer_id = order.customer_id;
        let request = GatewayInitRequest {
            amount,
            email,
            reference: reference.clone(),
            callback_url: format!("{}{}", origin, self.callback_path),
            metadata: GatewayMetadata {
                order_data: serde_json::to_string(&order)?,
            },
        };

        info!(reference = %reference, amount, "Initializing payment");
        let authorization = self.gateway.initialize(&request).await?;

        self.event_sender
            .send_or_log(Event::PaymentInitialized {
                reference,
                customer_id,
                amount_minor: amount,
            })
            .await;

        Ok(authorization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("buyer@example.com", true)]
    #[case("first.last@shop.com.ng", true)]
    #[case("buyer@example", false)]
    #[case("buyer example@example.com", false)]
    #[case("@example.com", false)]
    #[case("", false)]
    fn email_shape(#[case] email: &str, #[case] valid: bool) {
        assert_eq!(is_valid_email(email), valid);
    }
}

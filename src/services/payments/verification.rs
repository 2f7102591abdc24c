use chrono::Utc;
use sea_orm::SqlErr;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::gateway::{GatewayTransaction, PaymentGateway};
use super::types::{PendingOrderPayload, VerificationOutcome};
use crate::entities::order::{self, PaymentStatus};
use crate::entities::payment_reconciliation::{ReconciliationReason, STATUS_OPEN};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::repositories::{CartStore, NewReconciliation, OrderStore, ReconciliationStore};

pub const MSG_ORDER_CREATED: &str = "Payment verified and order created";
pub const MSG_ALREADY_VERIFIED: &str = "Payment already verified";
pub const MSG_ORDER_FAILED: &str = "Failed to create order";
const MSG_VERIFICATION_FAILED: &str = "Payment verification failed";

/// The single writer of orders for gateway payments.
///
/// A reference is turned into orders only after the gateway reports the
/// transaction as `success`. Replays of the same reference return the orders
/// already written; anomalies leave a reconciliation record behind.
#[derive(Clone)]
pub struct PaymentVerificationService {
    gateway: Arc<dyn PaymentGateway>,
    orders: Arc<dyn OrderStore>,
    carts: Arc<dyn CartStore>,
    reconciliations: Arc<dyn ReconciliationStore>,
    event_sender: Arc<EventSender>,
    currency: String,
}

/// A confirmed payment whose payload cannot become orders
struct Anomaly {
    reason: ReconciliationReason,
    message: String,
    customer_id: Option<Uuid>,
    payload: Option<String>,
    /// Internal cause, logged but never shown to the buyer
    detail: Option<String>,
}

impl PaymentVerificationService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        orders: Arc<dyn OrderStore>,
        carts: Arc<dyn CartStore>,
        reconciliations: Arc<dyn ReconciliationStore>,
        event_sender: Arc<EventSender>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            orders,
            carts,
            reconciliations,
            event_sender,
            currency: currency.into(),
        }
    }

    /// Verifies a reference and materializes its orders on confirmed success.
    ///
    /// Returns `Err` only for a missing reference or a failing data store lookup;
    /// every other outcome is a terminal [`VerificationOutcome`].
    #[instrument(skip(self))]
    pub async fn verify(&self, reference: Option<&str>) -> Result<VerificationOutcome, ServiceError> {
        let reference = reference
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                ServiceError::ValidationError("Payment reference is required".to_string())
            })?;

        let existing = self.orders.find_by_reference(reference).await?;
        if let Some(outcome) = Self::already_verified(&existing) {
            info!(reference, "Reference already materialized");
            return Ok(outcome);
        }

        let transaction = match self.gateway.verify(reference).await {
            Ok(transaction) => transaction,
            Err(err) => {
                let message = match err {
                    ServiceError::GatewayError(message) => message,
                    other => {
                        error!("Gateway verification error: {}", other);
                        MSG_VERIFICATION_FAILED.to_string()
                    }
                };
                self.event_sender
                    .send_or_log(Event::PaymentFailed {
                        reference: reference.to_string(),
                        gateway_status: message.clone(),
                    })
                    .await;
                return Ok(VerificationOutcome::failed(message));
            }
        };

        if !transaction.is_success() {
            warn!(reference, status = %transaction.status, "Payment was not successful");
            self.event_sender
                .send_or_log(Event::PaymentFailed {
                    reference: reference.to_string(),
                    gateway_status: transaction.status.clone(),
                })
                .await;
            return Ok(VerificationOutcome::failed(format!(
                "Payment {}",
                transaction.status
            )));
        }

        let payload = match Self::decode_payload(&transaction) {
            Ok(payload) => payload,
            Err(anomaly) => return Ok(self.report_anomaly(reference, &transaction, anomaly).await),
        };

        let customer_id = payload.customer_id;
        let raw_payload = transaction.order_data();
        let new_orders = payload.into_new_orders(
            self.gateway.method(),
            PaymentStatus::Paid,
            Some(reference.to_string()),
            &self.currency,
        );

        let created = match self.orders.create_orders(new_orders, None).await {
            Ok(created) => created,
            Err(ServiceError::PersistenceError(db_err))
                if matches!(db_err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
            {
                // A concurrent verification of the same reference won the insert
                let existing = self.orders.find_by_reference(reference).await?;
                if let Some(outcome) = Self::already_verified(&existing) {
                    info!(reference, "Lost materialization race; returning existing orders");
                    return Ok(outcome);
                }
                return Ok(self
                    .report_anomaly(
                        reference,
                        &transaction,
                        Anomaly::persistence(customer_id, raw_payload, db_err.to_string()),
                    )
                    .await);
            }
            Err(err) => {
                return Ok(self
                    .report_anomaly(
                        reference,
                        &transaction,
                        Anomaly::persistence(customer_id, raw_payload, err.to_string()),
                    )
                    .await);
            }
        };

        // The purchase is committed; a stale cart is only an inconvenience
        match self.carts.clear(customer_id).await {
            Ok(removed) => {
                self.event_sender
                    .send_or_log(Event::CartCleared(customer_id))
                    .await;
                info!(reference, removed, "Cleared buyer cart");
            }
            Err(e) => warn!(reference, customer_id = %customer_id, "Failed to clear cart: {}", e),
        }

        for order in &created {
            self.event_sender
                .send_or_log(Event::OrderCreated {
                    order_id: order.id,
                    customer_id: order.customer_id,
                    vendor_id: order.vendor_id,
                    payment_method: order.payment_method.clone(),
                })
                .await;
        }

        let order_ids: Vec<Uuid> = created.iter().map(|o| o.id).collect();
        self.event_sender
            .send_or_log(Event::PaymentVerified {
                reference: reference.to_string(),
                order_ids: order_ids.clone(),
            })
            .await;

        info!(reference, orders = order_ids.len(), "Payment verification completed successfully");

        match order_ids.first() {
            Some(&order_id) => Ok(VerificationOutcome::Success {
                message: MSG_ORDER_CREATED.to_string(),
                order_id,
                order_ids,
            }),
            None => Err(ServiceError::InternalError(
                "Verified payload produced no orders".to_string(),
            )),
        }
    }

    fn already_verified(existing: &[order::Model]) -> Option<VerificationOutcome> {
        let order_id = existing.first()?.id;
        Some(VerificationOutcome::Success {
            message: MSG_ALREADY_VERIFIED.to_string(),
            order_id,
            order_ids: existing.iter().map(|o| o.id).collect(),
        })
    }

    fn decode_payload(transaction: &GatewayTransaction) -> Result<PendingOrderPayload, Anomaly> {
        let Some(raw) = transaction.order_data() else {
            return Err(Anomaly {
                reason: ReconciliationReason::MissingPayload,
                message: "Order data missing from payment".to_string(),
                customer_id: None,
                payload: None,
                detail: None,
            });
        };

        let payload: PendingOrderPayload = serde_json::from_str(&raw).map_err(|e| Anomaly {
            reason: ReconciliationReason::InvalidPayload,
            message: format!("{}: order data could not be read ({})", MSG_ORDER_FAILED, e),
            customer_id: None,
            payload: Some(raw.clone()),
            detail: None,
        })?;

        if let Err(e) = payload.check_totals() {
            return Err(Anomaly {
                reason: ReconciliationReason::InvalidPayload,
                message: format!("{}: {}", MSG_ORDER_FAILED, e),
                customer_id: Some(payload.customer_id),
                payload: Some(raw),
                detail: None,
            });
        }

        if payload.total_amount_minor != transaction.amount {
            return Err(Anomaly {
                reason: ReconciliationReason::AmountMismatch,
                message: "Payment amount does not match order total".to_string(),
                customer_id: Some(payload.customer_id),
                payload: Some(raw),
                detail: None,
            });
        }

        Ok(payload)
    }

    async fn report_anomaly(
        &self,
        reference: &str,
        transaction: &GatewayTransaction,
        anomaly: Anomaly,
    ) -> VerificationOutcome {
        if self.reconciliation_recorded(reference, anomaly.reason).await {
            info!(
                reference,
                reason = %anomaly.reason,
                "Reconciliation already open for replayed reference"
            );
            return VerificationOutcome::failed(anomaly.message);
        }

        error!(
            reference,
            reason = %anomaly.reason,
            amount = transaction.amount,
            detail = anomaly.detail.as_deref().unwrap_or_default(),
            "Payment confirmed but no order was created: {}",
            anomaly.message
        );

        let entry = NewReconciliation {
            reference: reference.to_string(),
            customer_id: anomaly.customer_id,
            amount_minor: transaction.amount,
            reason: anomaly.reason,
            payload: anomaly.payload,
        };
        match self.reconciliations.record(entry).await {
            Ok(_) => {}
            Err(ServiceError::PersistenceError(db_err))
                if matches!(db_err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) =>
            {
                info!(reference, "Concurrent replay already recorded the reconciliation");
                return VerificationOutcome::failed(anomaly.message);
            }
            Err(e) => error!(reference, "Failed to record payment reconciliation: {}", e),
        }

        self.event_sender
            .send_or_log(Event::PaymentAnomaly {
                reference: reference.to_string(),
                reason: anomaly.reason.to_string(),
                timestamp: Utc::now(),
            })
            .await;

        VerificationOutcome::failed(anomaly.message)
    }

    /// Whether an open record for this reference and reason already exists.
    /// A failed lookup counts as absent so the anomaly is still recorded.
    async fn reconciliation_recorded(&self, reference: &str, reason: ReconciliationReason) -> bool {
        match self.reconciliations.find_by_reference(reference).await {
            Ok(rows) => rows
                .iter()
                .any(|row| row.status == STATUS_OPEN && row.reason == reason.to_string()),
            Err(e) => {
                warn!(reference, "Reconciliation lookup failed: {}", e);
                false
            }
        }
    }
}

impl Anomaly {
    fn persistence(customer_id: Uuid, payload: Option<String>, detail: String) -> Self {
        Anomaly {
            reason: ReconciliationReason::PersistenceFailed,
            message: MSG_ORDER_FAILED.to_string(),
            detail: Some(detail),
            customer_id: Some(customer_id),
            payload,
        }
    }
}

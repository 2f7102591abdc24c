use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::checkout_validator::CheckoutForm;
use crate::{
    entities::order::{self, PaymentMethod, PaymentStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{CartStore, ConsumedCart, OrderStore, PricedCartLine},
    services::payments::{
        types::{OrderLineDraft, VendorOrderDraft},
        InitiatePaymentRequest, PaymentAuthorization, PaymentInitiationService,
        PendingOrderPayload,
    },
};

/// Checkout submission: the validated form plus the chosen payment method
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    #[serde(flatten)]
    pub form: CheckoutForm,
    pub payment_method: PaymentMethod,
}

/// Result of a checkout submission
#[derive(Debug, Clone)]
pub enum CheckoutOutcome {
    /// Orders were written directly, payment is collected on delivery
    OrdersPlaced(Vec<order::Model>),
    /// A gateway transaction was opened; the buyer must be sent to its page
    PaymentRedirect(PaymentAuthorization),
}

/// Turns a buyer's cart into either cash-on-delivery orders or a gateway
/// transaction carrying the pending order payload.
#[derive(Clone)]
pub struct CheckoutService {
    carts: Arc<dyn CartStore>,
    orders: Arc<dyn OrderStore>,
    initiation: Arc<PaymentInitiationService>,
    event_sender: Arc<EventSender>,
    currency: String,
}

/// Correlation token for a new gateway transaction
pub fn generate_reference() -> String {
    format!("order_{}", Utc::now().timestamp_millis())
}

fn amount_overflow() -> ServiceError {
    ServiceError::ValidationError("Cart total is too large".to_string())
}

/// Groups priced cart lines by vendor, keeping the order in which vendors first
/// appear in the cart, and captures each line's current unit price.
pub fn build_payload(
    customer_id: Uuid,
    form: &CheckoutForm,
    lines: &[PricedCartLine],
    payment_method: PaymentMethod,
) -> Result<PendingOrderPayload, ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::ValidationError("Cart is empty".to_string()));
    }

    let mut vendors: Vec<VendorOrderDraft> = Vec::new();
    for priced in lines {
        if !priced.product.is_active {
            return Err(ServiceError::ValidationError(format!(
                "Product {} is no longer available",
                priced.product.name
            )));
        }

        let line = OrderLineDraft {
            product_id: priced.product.id,
            quantity: priced.line.quantity,
            unit_price_minor: priced.product.price_minor,
        };
        let line_total = line.total_minor().ok_or_else(amount_overflow)?;
        let vendor_id = priced.product.vendor_id;
        match vendors.iter_mut().find(|v| v.vendor_id == vendor_id) {
            Some(vendor) => {
                vendor.subtotal_minor = vendor
                    .subtotal_minor
                    .checked_add(line_total)
                    .ok_or_else(amount_overflow)?;
                vendor.lines.push(line);
            }
            None => vendors.push(VendorOrderDraft {
                vendor_id,
                subtotal_minor: line_total,
                lines: vec![line],
            }),
        }
    }

    let total_amount_minor = vendors
        .iter()
        .try_fold(0i64, |total, v| total.checked_add(v.subtotal_minor))
        .ok_or_else(amount_overflow)?;

    Ok(PendingOrderPayload {
        customer_id,
        delivery_address: form.delivery_address(),
        delivery_phone: form.phone.clone(),
        notes: form.notes.clone(),
        total_amount_minor,
        payment_method,
        vendors,
    })
}

impl CheckoutService {
    pub fn new(
        carts: Arc<dyn CartStore>,
        orders: Arc<dyn OrderStore>,
        initiation: Arc<PaymentInitiationService>,
        event_sender: Arc<EventSender>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            carts,
            orders,
            initiation,
            event_sender,
            currency: currency.into(),
        }
    }

    /// Validates the form, prices the cart and dispatches on the payment method.
    ///
    /// `origin` is only needed for gateway payments, to build the return URL.
    #[instrument(skip(self, request, origin), fields(payment_method = %request.payment_method))]
    pub async fn submit(
        &self,
        customer_id: Uuid,
        request: CheckoutRequest,
        origin: Option<&str>,
    ) -> Result<CheckoutOutcome, ServiceError> {
        let form = request.form.validated()?;
        let lines = self.carts.priced_lines(customer_id).await?;
        let payload = build_payload(customer_id, &form, &lines, request.payment_method)?;

        match request.payment_method {
            PaymentMethod::Cod => self
                .place_cash_on_delivery(payload)
                .await
                .map(CheckoutOutcome::OrdersPlaced),
            PaymentMethod::Paystack => self
                .start_gateway_payment(form.email, payload, origin)
                .await
                .map(CheckoutOutcome::PaymentRedirect),
        }
    }

    /// Writes the orders with `pending` payment and removes the purchased lines
    /// in the same transaction.
    pub async fn place_cash_on_delivery(
        &self,
        payload: PendingOrderPayload,
    ) -> Result<Vec<order::Model>, ServiceError> {
        let customer_id = payload.customer_id;
        let consumed = ConsumedCart {
            user_id: customer_id,
            product_ids: payload.product_ids(),
        };
        let new_orders =
            payload.into_new_orders(PaymentMethod::Cod, PaymentStatus::Pending, None, &self.currency);

        let created = self
            .orders
            .create_orders(new_orders, Some(consumed))
            .await
            .map_err(|e| {
                warn!(customer_id = %customer_id, "Cash on delivery order failed: {}", e);
                e
            })?;

        for order in &created {
            self.event_sender
                .send_or_log(Event::OrderCreated {
                    order_id: order.id,
                    customer_id,
                    vendor_id: order.vendor_id,
                    payment_method: order.payment_method.clone(),
                })
                .await;
        }
        self.event_sender
            .send_or_log(Event::CartCleared(customer_id))
            .await;

        info!(customer_id = %customer_id, orders = created.len(), "Cash on delivery order placed");
        Ok(created)
    }

    /// Opens a gateway transaction through the same gate as the payment function
    async fn start_gateway_payment(
        &self,
        email: String,
        payload: PendingOrderPayload,
        origin: Option<&str>,
    ) -> Result<PaymentAuthorization, ServiceError> {
        let origin = origin
            .map(|o| o.trim_end_matches('/'))
            .filter(|o| !o.is_empty())
            .ok_or_else(|| {
                ServiceError::ValidationError("Unable to determine callback origin".to_string())
            })?;

        let request = InitiatePaymentRequest {
            amount: Some(payload.total_amount_minor.into()),
            email: Some(email),
            reference: Some(generate_reference()),
            order_data: Some(serde_json::to_value(&payload)?),
        };
        let validated = self.initiation.prepare(request).await?;
        self.initiation.open_transaction(validated, origin).await
    }
}

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::order::{PaymentMethod, PaymentStatus};
use crate::repositories::{NewOrder, NewOrderItem};

/// One purchased product with the price captured at checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderLineDraft {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price_minor: i64,
}

impl OrderLineDraft {
    /// `None` when the product does not fit in an `i64`
    pub fn total_minor(&self) -> Option<i64> {
        self.unit_price_minor.checked_mul(i64::from(self.quantity))
    }
}

/// The part of a checkout that becomes a single vendor's order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VendorOrderDraft {
    pub vendor_id: Uuid,
    pub subtotal_minor: i64,
    pub lines: Vec<OrderLineDraft>,
}

/// Order intent assembled at checkout. For online payments it travels inside the
/// gateway transaction metadata and is only materialized after verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PendingOrderPayload {
    pub customer_id: Uuid,
    pub delivery_address: String,
    pub delivery_phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub total_amount_minor: i64,
    pub payment_method: PaymentMethod,
    pub vendors: Vec<VendorOrderDraft>,
}

impl PendingOrderPayload {
    /// Checks the payload is internally consistent: at least one line, positive
    /// quantities and prices, each vendor and product listed once, subtotals
    /// that add up to the total without overflowing.
    pub fn check_totals(&self) -> Result<(), String> {
        if self.vendors.is_empty() || self.vendors.iter().any(|v| v.lines.is_empty()) {
            return Err("Order has no items".to_string());
        }

        let mut vendor_ids = HashSet::new();
        let mut product_ids = HashSet::new();
        let mut total = 0i64;
        for vendor in &self.vendors {
            if !vendor_ids.insert(vendor.vendor_id) {
                return Err(format!("Vendor {} is listed more than once", vendor.vendor_id));
            }

            let mut subtotal = 0i64;
            for line in &vendor.lines {
                if line.quantity < 1 || line.unit_price_minor < 0 {
                    return Err(format!("Invalid line for product {}", line.product_id));
                }
                if !product_ids.insert(line.product_id) {
                    return Err(format!("Product {} is listed more than once", line.product_id));
                }
                subtotal = line
                    .total_minor()
                    .and_then(|line_total| subtotal.checked_add(line_total))
                    .ok_or_else(|| format!("Amount overflow for vendor {}", vendor.vendor_id))?;
            }
            if subtotal != vendor.subtotal_minor {
                return Err(format!("Subtotal mismatch for vendor {}", vendor.vendor_id));
            }
            total = total
                .checked_add(subtotal)
                .ok_or_else(|| "Order total overflows".to_string())?;
        }

        if total != self.total_amount_minor {
            return Err("Order total does not match its lines".to_string());
        }
        Ok(())
    }

    pub fn product_ids(&self) -> Vec<Uuid> {
        self.vendors
            .iter()
            .flat_map(|v| v.lines.iter().map(|l| l.product_id))
            .collect()
    }

    /// Expands the payload into one order per vendor
    pub fn into_new_orders(
        self,
        payment_method: PaymentMethod,
        payment_status: PaymentStatus,
        payment_reference: Option<String>,
        currency: &str,
    ) -> Vec<NewOrder> {
        let PendingOrderPayload {
            customer_id,
            delivery_address,
            delivery_phone,
            notes,
            vendors,
            ..
        } = self;

        vendors
            .into_iter()
            .map(|vendor| NewOrder {
                customer_id,
                vendor_id: vendor.vendor_id,
                total_amount_minor: vendor.subtotal_minor,
                currency: currency.to_string(),
                payment_method,
                payment_status,
                delivery_address: delivery_address.clone(),
                delivery_phone: delivery_phone.clone(),
                notes: notes.clone(),
                payment_reference: payment_reference.clone(),
                items: vendor
                    .lines
                    .into_iter()
                    .map(|line| NewOrderItem {
                        product_id: line.product_id,
                        quantity: line.quantity,
                        unit_price_minor: line.unit_price_minor,
                    })
                    .collect(),
            })
            .collect()
    }
}

/// Body of the payment initiation function. Fields are optional so that absent
/// values are reported as validation failures rather than decode errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct InitiatePaymentRequest {
    #[schema(value_type = Option<i64>, example = 500000)]
    pub amount: Option<serde_json::Number>,
    pub email: Option<String>,
    pub reference: Option<String>,
    #[serde(rename = "orderData")]
    #[schema(value_type = Option<PendingOrderPayload>)]
    pub order_data: Option<serde_json::Value>,
}

/// Gateway redirect target, passed through unchanged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentAuthorization {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub reference: Option<String>,
}

/// Terminal result of a verification. Logical failures are still HTTP 200.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum VerificationOutcome {
    Success {
        message: String,
        order_id: Uuid,
        order_ids: Vec<Uuid>,
    },
    Failed {
        message: String,
    },
}

impl VerificationOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        VerificationOutcome::Failed {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, VerificationOutcome::Success { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            VerificationOutcome::Success { message, .. } | VerificationOutcome::Failed { message } => {
                message
            }
        }
    }
}

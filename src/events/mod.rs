use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{}", e);
        }
    }
}

/// Domain events raised by cart, checkout and payment flows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    CartLineAdded {
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    CartLineUpdated {
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    },
    CartLineRemoved {
        user_id: Uuid,
        product_id: Uuid,
    },
    CartCleared(Uuid),

    OrderCreated {
        order_id: Uuid,
        customer_id: Uuid,
        vendor_id: Uuid,
        payment_method: String,
    },

    PaymentInitialized {
        reference: String,
        customer_id: Uuid,
        amount_minor: i64,
    },
    PaymentVerified {
        reference: String,
        order_ids: Vec<Uuid>,
    },
    PaymentFailed {
        reference: String,
        gateway_status: String,
    },
    /// Money confirmed by the gateway without a matching order
    PaymentAnomaly {
        reference: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

/// Drains the event channel, logging each event until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::PaymentAnomaly {
                reference, reason, ..
            } => {
                error!(reference = %reference, reason = %reason, "Payment requires reconciliation");
            }
            Event::PaymentFailed {
                reference,
                gateway_status,
            } => {
                warn!(reference = %reference, status = %gateway_status, "Payment not confirmed");
            }
            other => info!("Received event: {:?}", other),
        }
    }

    info!("Event processing loop stopped");
}

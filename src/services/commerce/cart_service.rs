use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    events::{Event, EventSender},
    repositories::{CartStore, PricedCartLine},
};

/// Buyer's cart.
///
/// The owner is passed into every call rather than read from ambient state, and
/// every storage call is scoped by it. Totals are recomputed from current
/// product prices on each read.
///
/// # Examples
///
/// ```ignore
/// let carts = CartService::new(Arc::new(CartRepository::new(db)), event_sender);
///
/// carts.add_item(buyer_id, AddToCartInput { product_id, quantity: 2 }).await?;
/// let summary = carts.summary(buyer_id).await?;
/// assert_eq!(summary.item_count, 2);
/// ```
#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartStore>,
    event_sender: Arc<EventSender>,
}

/// Input for adding a product to the cart
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddToCartInput {
    pub product_id: Uuid,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

/// One cart line priced at the product's current price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartLineView {
    pub product_id: Uuid,
    pub vendor_id: Uuid,
    pub name: String,
    pub quantity: i32,
    pub unit_price_minor: i64,
    pub line_total_minor: i64,
    pub is_active: bool,
}

impl From<&PricedCartLine> for CartLineView {
    fn from(priced: &PricedCartLine) -> Self {
        Self {
            product_id: priced.product.id,
            vendor_id: priced.product.vendor_id,
            name: priced.product.name.clone(),
            quantity: priced.line.quantity,
            unit_price_minor: priced.product.price_minor,
            line_total_minor: priced.line_total_minor(),
            is_active: priced.product.is_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartSummary {
    pub items: Vec<CartLineView>,
    pub item_count: i64,
    pub total_minor: i64,
}

impl CartSummary {
    pub fn from_lines(lines: &[PricedCartLine]) -> Self {
        let items: Vec<CartLineView> = lines.iter().map(CartLineView::from).collect();
        Self {
            item_count: items.iter().map(|i| i64::from(i.quantity)).sum(),
            total_minor: cart_total(lines),
            items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Sum of quantity times current unit price over all lines
pub fn cart_total(lines: &[PricedCartLine]) -> i64 {
    lines
        .iter()
        .map(PricedCartLine::line_total_minor)
        .fold(0, i64::saturating_add)
}

impl CartService {
    pub fn new(carts: Arc<dyn CartStore>, event_sender: Arc<EventSender>) -> Self {
        Self {
            carts,
            event_sender,
        }
    }

    /// Adds a product, or increments the quantity of an existing line
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        input: AddToCartInput,
    ) -> Result<CartSummary, ServiceError> {
        ensure_quantity(input.quantity)?;

        let product = self
            .carts
            .find_product(input.product_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {} not found", input.product_id))
            })?;
        if !product.is_active {
            return Err(ServiceError::ValidationError(format!(
                "Product {} is not available",
                product.name
            )));
        }

        let line = self
            .carts
            .add_quantity(user_id, input.product_id, input.quantity)
            .await?;

        self.event_sender
            .send_or_log(Event::CartLineAdded {
                user_id,
                product_id: input.product_id,
                quantity: line.quantity,
            })
            .await;

        info!(product_id = %input.product_id, quantity = line.quantity, "Added item to cart");
        self.summary(user_id).await
    }

    /// Replaces the quantity of an existing line
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartSummary, ServiceError> {
        ensure_quantity(quantity)?;

        self.carts
            .set_quantity(user_id, product_id, quantity)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} is not in the cart", product_id)))?;

        self.event_sender
            .send_or_log(Event::CartLineUpdated {
                user_id,
                product_id,
                quantity,
            })
            .await;

        self.summary(user_id).await
    }

    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<CartSummary, ServiceError> {
        let removed = self.carts.remove_line(user_id, product_id).await?;
        if removed == 0 {
            return Err(ServiceError::NotFound(format!(
                "Product {} is not in the cart",
                product_id
            )));
        }

        self.event_sender
            .send_or_log(Event::CartLineRemoved {
                user_id,
                product_id,
            })
            .await;

        self.summary(user_id).await
    }

    /// Empties the cart; clearing an empty cart is a no-op
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        let removed = self.carts.clear(user_id).await?;
        if removed > 0 {
            self.event_sender
                .send_or_log(Event::CartCleared(user_id))
                .await;
        }
        Ok(removed)
    }

    pub async fn lines(&self, user_id: Uuid) -> Result<Vec<PricedCartLine>, ServiceError> {
        self.carts.priced_lines(user_id).await
    }

    pub async fn summary(&self, user_id: Uuid) -> Result<CartSummary, ServiceError> {
        let lines = self.lines(user_id).await?;
        Ok(CartSummary::from_lines(&lines))
    }

    pub async fn total(&self, user_id: Uuid) -> Result<i64, ServiceError> {
        Ok(cart_total(&self.lines(user_id).await?))
    }

    pub async fn item_count(&self, user_id: Uuid) -> Result<i64, ServiceError> {
        Ok(self.summary(user_id).await?.item_count)
    }
}

fn ensure_quantity(quantity: i32) -> Result<(), ServiceError> {
    if quantity < 1 {
        return Err(ServiceError::ValidationError(
            "Quantity must be at least 1".to_string(),
        ));
    }
    Ok(())
}

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::{BaseRepository, Repository};
use crate::entities::order::{OrderStatus, PaymentMethod, PaymentStatus};
use crate::entities::{cart_line, order, order_item};
use crate::errors::ServiceError;

/// An order ready to be written, one per vendor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub customer_id: Uuid,
    pub vendor_id: Uuid,
    pub total_amount_minor: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub delivery_address: String,
    pub delivery_phone: String,
    pub notes: Option<String>,
    pub payment_reference: Option<String>,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price_minor: i64,
}

/// Cart lines deleted in the same transaction that writes the orders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumedCart {
    pub user_id: Uuid,
    pub product_ids: Vec<Uuid>,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Writes every order with its items atomically. Either all rows land or none do.
    async fn create_orders(
        &self,
        orders: Vec<NewOrder>,
        consumed: Option<ConsumedCart>,
    ) -> Result<Vec<order::Model>, ServiceError>;

    async fn find_by_reference(&self, reference: &str) -> Result<Vec<order::Model>, ServiceError>;

    async fn list_for_customer(&self, customer_id: Uuid)
        -> Result<Vec<order::Model>, ServiceError>;

    async fn find_for_customer(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<(order::Model, Vec<order_item::Model>)>, ServiceError>;
}

/// Repository for order operations
#[derive(Debug, Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn create_orders(
        &self,
        orders: Vec<NewOrder>,
        consumed: Option<ConsumedCart>,
    ) -> Result<Vec<order::Model>, ServiceError> {
        let txn = self.get_db().begin().await?;
        let now = Utc::now();
        let mut created = Vec::with_capacity(orders.len());

        for new_order in orders {
            let order_id = Uuid::new_v4();
            let model = order::ActiveModel {
                id: Set(order_id),
                customer_id: Set(new_order.customer_id),
                vendor_id: Set(new_order.vendor_id),
                total_amount_minor: Set(new_order.total_amount_minor),
                currency: Set(new_order.currency),
                payment_method: Set(new_order.payment_method.to_string()),
                payment_status: Set(new_order.payment_status.to_string()),
                order_status: Set(OrderStatus::Pending.to_string()),
                delivery_address: Set(new_order.delivery_address),
                delivery_phone: Set(new_order.delivery_phone),
                notes: Set(new_order.notes),
                payment_reference: Set(new_order.payment_reference),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;

            for item in new_order.items {
                let total_price_minor = item
                    .unit_price_minor
                    .checked_mul(i64::from(item.quantity))
                    .ok_or_else(|| {
                        ServiceError::ValidationError(format!(
                            "Invalid order data: amount overflow for product {}",
                            item.product_id
                        ))
                    })?;
                order_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    order_id: Set(order_id),
                    product_id: Set(item.product_id),
                    quantity: Set(item.quantity),
                    unit_price_minor: Set(item.unit_price_minor),
                    total_price_minor: Set(total_price_minor),
                    created_at: Set(now),
                }
                .insert(&txn)
                .await?;
            }

            created.push(model);
        }

        if let Some(consumed) = consumed {
            let removed = cart_line::Entity::delete_many()
                .filter(cart_line::Column::UserId.eq(consumed.user_id))
                .filter(cart_line::Column::ProductId.is_in(consumed.product_ids))
                .exec(&txn)
                .await?;
            debug!(rows = removed.rows_affected, "Removed purchased cart lines");
        }

        txn.commit().await?;
        Ok(created)
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Vec<order::Model>, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::PaymentReference.eq(reference))
            .order_by_asc(order::Column::CreatedAt)
            .order_by_asc(order::Column::Id)
            .all(self.get_db())
            .await?)
    }

    async fn list_for_customer(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<order::Model>, ServiceError> {
        Ok(order::Entity::find()
            .filter(order::Column::CustomerId.eq(customer_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(self.get_db())
            .await?)
    }

    async fn find_for_customer(
        &self,
        customer_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<(order::Model, Vec<order_item::Model>)>, ServiceError> {
        let Some(order) = order::Entity::find_by_id(order_id)
            .filter(order::Column::CustomerId.eq(customer_id))
            .one(self.get_db())
            .await?
        else {
            return Ok(None);
        };

        let items = order
            .find_related(order_item::Entity)
            .all(self.get_db())
            .await?;

        Ok(Some((order, items)))
    }
}

impl Repository for OrderRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}

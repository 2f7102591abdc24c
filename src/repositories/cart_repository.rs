use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    SqlErr,
};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use super::{BaseRepository, Repository};
use crate::entities::{cart_line, product};
use crate::errors::ServiceError;

/// A cart line joined with the product it points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedCartLine {
    pub line: cart_line::Model,
    pub product: product::Model,
}

impl PricedCartLine {
    /// Display total, saturating at `i64::MAX`. Checkout re-checks with exact arithmetic.
    pub fn line_total_minor(&self) -> i64 {
        self.product
            .price_minor
            .saturating_mul(i64::from(self.line.quantity))
    }
}

/// Owner-scoped cart storage
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn find_product(&self, product_id: Uuid) -> Result<Option<product::Model>, ServiceError>;

    /// Lines for the owner, oldest first, with their current product rows
    async fn priced_lines(&self, user_id: Uuid) -> Result<Vec<PricedCartLine>, ServiceError>;

    /// Adds `quantity` to the owner's line for `product_id`, creating it on first add
    async fn add_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<cart_line::Model, ServiceError>;

    /// Overwrites the quantity; `None` when the owner has no such line
    async fn set_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Option<cart_line::Model>, ServiceError>;

    async fn remove_line(&self, user_id: Uuid, product_id: Uuid) -> Result<u64, ServiceError>;

    async fn clear(&self, user_id: Uuid) -> Result<u64, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct CartRepository {
    base: BaseRepository,
}

impl CartRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    async fn find_line(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<cart_line::Model>, ServiceError> {
        Ok(cart_line::Entity::find()
            .filter(cart_line::Column::UserId.eq(user_id))
            .filter(cart_line::Column::ProductId.eq(product_id))
            .one(self.get_db())
            .await?)
    }

    async fn bump(
        &self,
        existing: cart_line::Model,
        quantity: i32,
    ) -> Result<cart_line::Model, ServiceError> {
        let new_quantity = existing.quantity.saturating_add(quantity);
        let mut active: cart_line::ActiveModel = existing.into();
        active.quantity = Set(new_quantity);
        active.updated_at = Set(Utc::now());
        Ok(active.update(self.get_db()).await?)
    }
}

#[async_trait]
impl CartStore for CartRepository {
    async fn find_product(&self, product_id: Uuid) -> Result<Option<product::Model>, ServiceError> {
        Ok(product::Entity::find_by_id(product_id)
            .one(self.get_db())
            .await?)
    }

    async fn priced_lines(&self, user_id: Uuid) -> Result<Vec<PricedCartLine>, ServiceError> {
        let rows = cart_line::Entity::find()
            .filter(cart_line::Column::UserId.eq(user_id))
            .order_by_asc(cart_line::Column::CreatedAt)
            .find_also_related(product::Entity)
            .all(self.get_db())
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(line, product)| match product {
                Some(product) => Some(PricedCartLine { line, product }),
                None => {
                    warn!(line_id = %line.id, product_id = %line.product_id, "Cart line points at a missing product");
                    None
                }
            })
            .collect())
    }

    async fn add_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<cart_line::Model, ServiceError> {
        if let Some(existing) = self.find_line(user_id, product_id).await? {
            return self.bump(existing, quantity).await;
        }

        let now = Utc::now();
        let line = cart_line::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            product_id: Set(product_id),
            quantity: Set(quantity),
            created_at: Set(now),
            updated_at: Set(now),
        };

        match line.insert(self.get_db()).await {
            Ok(model) => Ok(model),
            // A concurrent add created the line first
            Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                match self.find_line(user_id, product_id).await? {
                    Some(existing) => self.bump(existing, quantity).await,
                    None => Err(ServiceError::PersistenceError(err)),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn set_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<Option<cart_line::Model>, ServiceError> {
        let Some(existing) = self.find_line(user_id, product_id).await? else {
            return Ok(None);
        };

        let mut active: cart_line::ActiveModel = existing.into();
        active.quantity = Set(quantity);
        active.updated_at = Set(Utc::now());
        Ok(Some(active.update(self.get_db()).await?))
    }

    async fn remove_line(&self, user_id: Uuid, product_id: Uuid) -> Result<u64, ServiceError> {
        let result = cart_line::Entity::delete_many()
            .filter(cart_line::Column::UserId.eq(user_id))
            .filter(cart_line::Column::ProductId.eq(product_id))
            .exec(self.get_db())
            .await?;
        Ok(result.rows_affected)
    }

    async fn clear(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        let result = cart_line::Entity::delete_many()
            .filter(cart_line::Column::UserId.eq(user_id))
            .exec(self.get_db())
            .await?;
        Ok(result.rows_affected)
    }
}

impl Repository for CartRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}

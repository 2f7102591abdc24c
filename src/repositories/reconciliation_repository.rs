use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{BaseRepository, Repository};
use crate::entities::payment_reconciliation::{self, ReconciliationReason, STATUS_OPEN};
use crate::errors::ServiceError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReconciliation {
    pub reference: String,
    pub customer_id: Option<Uuid>,
    pub amount_minor: i64,
    pub reason: ReconciliationReason,
    /// Raw metadata as echoed by the gateway
    pub payload: Option<String>,
}

#[async_trait]
pub trait ReconciliationStore: Send + Sync {
    async fn record(
        &self,
        entry: NewReconciliation,
    ) -> Result<payment_reconciliation::Model, ServiceError>;

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Vec<payment_reconciliation::Model>, ServiceError>;
}

#[derive(Debug, Clone)]
pub struct ReconciliationRepository {
    base: BaseRepository,
}

impl ReconciliationRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

#[async_trait]
impl ReconciliationStore for ReconciliationRepository {
    async fn record(
        &self,
        entry: NewReconciliation,
    ) -> Result<payment_reconciliation::Model, ServiceError> {
        let model = payment_reconciliation::ActiveModel {
            id: Set(Uuid::new_v4()),
            reference: Set(entry.reference),
            customer_id: Set(entry.customer_id),
            amount_minor: Set(entry.amount_minor),
            reason: Set(entry.reason.to_string()),
            payload: Set(entry.payload),
            status: Set(STATUS_OPEN.to_string()),
            created_at: Set(Utc::now()),
        };
        Ok(model.insert(self.get_db()).await?)
    }

    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Vec<payment_reconciliation::Model>, ServiceError> {
        Ok(payment_reconciliation::Entity::find()
            .filter(payment_reconciliation::Column::Reference.eq(reference))
            .order_by_asc(payment_reconciliation::Column::CreatedAt)
            .all(self.get_db())
            .await?)
    }
}

impl Repository for ReconciliationRepository {
    fn get_db(&self) -> &DatabaseConnection {
        self.base.get_db()
    }
}

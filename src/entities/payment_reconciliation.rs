use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Why a confirmed payment could not be turned into orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationReason {
    MissingPayload,
    InvalidPayload,
    AmountMismatch,
    PersistenceFailed,
}

/// A paid-but-orderless payment awaiting manual follow-up
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_reconciliations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub reference: String,
    pub customer_id: Option<Uuid>,
    pub amount_minor: i64,
    pub reason: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub payload: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Status written on every new reconciliation row
pub const STATUS_OPEN: &str = "open";

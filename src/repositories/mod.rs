//! Data-store access. Every buyer-facing query is scoped by the owner id,
//! mirroring the row-level rules of the hosted backend.

use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub mod cart_repository;
pub mod order_repository;
pub mod reconciliation_repository;

pub use cart_repository::{CartRepository, CartStore, PricedCartLine};
pub use order_repository::{ConsumedCart, NewOrder, NewOrderItem, OrderRepository, OrderStore};
pub use reconciliation_repository::{
    NewReconciliation, ReconciliationRepository, ReconciliationStore,
};

/// Repository trait for common database operations
pub trait Repository {
    fn get_db(&self) -> &DatabaseConnection;
}

#[derive(Debug, Clone)]
pub struct BaseRepository {
    db: Arc<DatabaseConnection>,
}

impl BaseRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl Repository for BaseRepository {
    fn get_db(&self) -> &DatabaseConnection {
        &self.db
    }
}

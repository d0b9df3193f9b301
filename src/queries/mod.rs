use crate::errors::ServiceError;
use async_trait::async_trait;
use sea_orm::DatabaseConnection;

pub mod audit_queries;
pub mod movement_queries;

pub use audit_queries::*;
pub use movement_queries::*;

/// A read-only question asked of the ledger store. Queries never open
/// transactions and never write.
#[async_trait]
pub trait Query: Send + Sync {
    type Result: Send + Sync;

    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError>;
}

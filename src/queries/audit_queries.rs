use crate::{
    entities::audit_log::{self, Entity as AuditLog, Model as AuditLogModel},
    entities::{consumable_item, OperationKind},
    errors::ServiceError,
    queries::Query,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audit trail for one item, newest entry first, with optional operation
/// and date-range narrowing.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetItemAuditTrailQuery {
    pub item_id: Uuid,
    pub operation_kind: Option<OperationKind>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: u64,
    pub offset: u64,
}

#[async_trait]
impl Query for GetItemAuditTrailQuery {
    type Result = Vec<AuditLogModel>;

    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let item = consumable_item::Entity::find_by_id(self.item_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if item.is_none() {
            return Err(ServiceError::item_not_found(self.item_id));
        }

        let mut find = AuditLog::find().filter(audit_log::Column::ItemId.eq(self.item_id));

        if let Some(kind) = self.operation_kind {
            find = find.filter(audit_log::Column::OperationKind.eq(kind.as_str()));
        }
        if let Some(start) = self.start_date {
            find = find.filter(audit_log::Column::CreatedAt.gte(start));
        }
        if let Some(end) = self.end_date {
            find = find.filter(audit_log::Column::CreatedAt.lte(end));
        }

        // The auto-incremented id is the write sequence, so ordering by it
        // is stable even when two entries share a timestamp.
        find.order_by_desc(audit_log::Column::Id)
            .limit(self.limit)
            .offset(self.offset)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }
}

/// Single audit entry lookup.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetAuditEntryQuery {
    pub entry_id: i64,
}

#[async_trait]
impl Query for GetAuditEntryQuery {
    type Result = AuditLogModel;

    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        AuditLog::find_by_id(self.entry_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::audit_entry_not_found(self.entry_id))
    }
}

/// Full amendment chain containing the given entry, oldest first.
///
/// Amendment rows point at the entry they supersede through
/// `original_log_id`, and a superseded entry can never be amended a
/// second time, so every entry has at most one successor. Parent links
/// are written once at insert, which keeps the walk acyclic.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetAmendmentChainQuery {
    pub entry_id: i64,
}

#[async_trait]
impl Query for GetAmendmentChainQuery {
    type Result = Vec<AuditLogModel>;

    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let mut entry = AuditLog::find_by_id(self.entry_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::audit_entry_not_found(self.entry_id))?;

        // Walk back to the root entry.
        while let Some(parent_id) = entry.original_log_id {
            entry = AuditLog::find_by_id(parent_id)
                .one(db)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| ServiceError::audit_entry_not_found(parent_id))?;
        }

        // Collect forward from the root.
        let mut cursor_id = entry.id;
        let mut chain = vec![entry];
        while let Some(successor) = AuditLog::find()
            .filter(audit_log::Column::OriginalLogId.eq(cursor_id))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
        {
            cursor_id = successor.id;
            chain.push(successor);
        }

        Ok(chain)
    }
}

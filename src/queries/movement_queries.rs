use crate::{
    entities::stock_movement::{self, Entity as StockMovement, Model as StockMovementModel},
    entities::{consumable_item, MovementKind},
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

/// Movement history for one item, newest first, with optional direction
/// and date-range narrowing.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetItemMovementsQuery {
    pub item_id: Uuid,
    pub kind: Option<MovementKind>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: u64,
    pub offset: u64,
}

#[async_trait]
impl Query for GetItemMovementsQuery {
    type Result = Vec<StockMovementModel>;

    async fn execute(&self, db: &DatabaseConnection) -> Result<Self::Result, ServiceError> {
        let item = consumable_item::Entity::find_by_id(self.item_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if item.is_none() {
            return Err(ServiceError::item_not_found(self.item_id));
        }

        let mut find =
            StockMovement::find().filter(stock_movement::Column::ItemId.eq(self.item_id));

        if let Some(kind) = self.kind {
            find = find.filter(stock_movement::Column::Kind.eq(kind.as_str()));
        }
        if let Some(start) = self.start_date {
            find = find.filter(stock_movement::Column::CreatedAt.gte(start));
        }
        if let Some(end) = self.end_date {
            find = find.filter(stock_movement::Column::CreatedAt.lte(end));
        }

        find.order_by_desc(stock_movement::Column::CreatedAt)
            .limit(self.limit)
            .offset(self.offset)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }
}

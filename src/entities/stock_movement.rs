use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementKind {
    Receive,
    Issue,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Receive => "receive",
            MovementKind::Issue => "issue",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "receive" => Some(MovementKind::Receive),
            "issue" => Some(MovementKind::Issue),
            _ => None,
        }
    }

    /// Ledger sign convention: receipts credit the balance, issues debit it.
    pub fn signed(&self, quantity: i32) -> i32 {
        match self {
            MovementKind::Receive => quantity,
            MovementKind::Issue => -quantity,
        }
    }
}

/// One accepted receive/issue against an item. Rows are written once,
/// inside the same transaction as the balance update, and never touched
/// again except by cascade delete of the owning item.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub item_id: Uuid,
    pub kind: String, // Stored as string in DB, converted via MovementKind
    pub quantity: i32,
    pub previous_stock: i32,
    pub current_stock: i32,
    pub operator: String,
    pub reason: Option<String>,
    pub recipient: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn kind(&self) -> Option<MovementKind> {
        MovementKind::from_str(&self.kind)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::consumable_item::Entity",
        from = "Column::ItemId",
        to = "super::consumable_item::Column::Id"
    )]
    ConsumableItem,
}

impl Related<super::consumable_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConsumableItem.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        if let ActiveValue::NotSet = active_model.created_at {
            active_model.created_at = Set(Utc::now());
        }
        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_storage_strings() {
        for kind in [MovementKind::Receive, MovementKind::Issue] {
            assert_eq!(MovementKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(MovementKind::from_str("transfer"), None);
    }

    #[test]
    fn signed_quantity_follows_direction() {
        assert_eq!(MovementKind::Receive.signed(40), 40);
        assert_eq!(MovementKind::Issue.signed(40), -40);
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveModelBehavior, ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Every operation that touches an item leaves one of these kinds behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Receive,
    Issue,
    Adjust,
    Create,
    Update,
    Delete,
    Import,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Receive => "receive",
            OperationKind::Issue => "issue",
            OperationKind::Adjust => "adjust",
            OperationKind::Create => "create",
            OperationKind::Update => "update",
            OperationKind::Delete => "delete",
            OperationKind::Import => "import",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "receive" => Some(OperationKind::Receive),
            "issue" => Some(OperationKind::Issue),
            "adjust" => Some(OperationKind::Adjust),
            "create" => Some(OperationKind::Create),
            "update" => Some(OperationKind::Update),
            "delete" => Some(OperationKind::Delete),
            "import" => Some(OperationKind::Import),
            _ => None,
        }
    }
}

impl From<super::stock_movement::MovementKind> for OperationKind {
    fn from(kind: super::stock_movement::MovementKind) -> Self {
        match kind {
            super::stock_movement::MovementKind::Receive => OperationKind::Receive,
            super::stock_movement::MovementKind::Issue => OperationKind::Issue,
        }
    }
}

/// Append-only trail of everything that happened to an item, independent
/// of the movement ledger. Entries written by the stock ledger service
/// are sealed (`is_editable = false`); manually entered ones may be
/// amended through a chain of follow-up rows linked by `original_log_id`,
/// never by rewriting stock figures in place.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "audit_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub item_id: Uuid,
    pub item_name: String,
    pub operation_kind: String, // Stored as string in DB, converted via OperationKind
    pub signed_quantity: i32,
    pub previous_stock: i32,
    pub current_stock: i32,
    pub operator: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub is_editable: bool,
    pub superseded: bool,
    pub original_log_id: Option<i64>,
    pub modified_by: Option<String>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modification_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn operation_kind(&self) -> Option<OperationKind> {
        OperationKind::from_str(&self.operation_kind)
    }

    /// Only live, manually entered rows accept amendments.
    pub fn is_amendable(&self) -> bool {
        self.is_editable && !self.superseded
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

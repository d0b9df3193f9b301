use crate::db::DbPool;
use crate::entities::audit_log::{self, OperationKind};
use crate::entities::consumable_item::{self, Entity as ConsumableItem};
use crate::entities::stock_movement;
use crate::errors::ServiceError;
use crate::events::{publish_best_effort, Event, EventSender};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    static ref ITEM_LIFECYCLE_OPS: IntCounterVec = register_int_counter_vec!(
        "item_lifecycle_operations_total",
        "Committed item lifecycle operations by kind",
        &["operation"]
    )
    .expect("metric can be created");
}

/// The catalog fields of an item, as supplied by a caller creating or
/// importing one. Stock balances move through the ledger afterwards; this
/// struct only seeds the opening balance.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ItemDraft {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[validate(length(min = 1, max = 32))]
    pub unit: String,
    #[validate(range(min = 0))]
    pub initial_stock: i32,
    #[validate(range(min = 0))]
    pub min_stock: i32,
    #[validate(range(min = 0))]
    pub max_stock: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateItemCommand {
    #[validate]
    pub item: ItemDraft,
    #[validate(length(min = 1, max = 128))]
    pub operator: String,
    #[validate(length(max = 512))]
    pub reason: Option<String>,
    #[validate(length(max = 1024))]
    pub notes: Option<String>,
}

/// Non-stock field edits. Every field is optional; `None` leaves the stored
/// value untouched. Balances are deliberately absent, those only change
/// through ledger mutations.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateItemCommand {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    #[validate(length(min = 1, max = 32))]
    pub unit: Option<String>,
    #[validate(range(min = 0))]
    pub min_stock: Option<i32>,
    #[validate(range(min = 0))]
    pub max_stock: Option<i32>,
    #[validate(length(min = 1, max = 128))]
    pub operator: String,
    #[validate(length(max = 512))]
    pub reason: Option<String>,
    #[validate(length(max = 1024))]
    pub notes: Option<String>,
}

impl UpdateItemCommand {
    fn changes_nothing(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.unit.is_none()
            && self.min_stock.is_none()
            && self.max_stock.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ImportItemsCommand {
    #[validate]
    pub items: Vec<ItemDraft>,
    #[validate(length(min = 1, max = 128))]
    pub operator: String,
    #[validate(length(max = 1024))]
    pub notes: Option<String>,
}

/// One page of the catalog listing together with the unpaginated total.
#[derive(Debug, Clone, Serialize)]
pub struct ItemListPage {
    pub items: Vec<consumable_item::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Result of removing an item, reporting how much history went with it.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DeletedItemSummary {
    pub item_id: Uuid,
    pub movements_removed: u64,
    pub audit_entries_removed: u64,
}

#[derive(Clone)]
pub struct ItemCatalogService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ItemCatalogService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates an item with `version = 0` and its opening balance, recording
    /// an editable `create` audit entry in the same transaction.
    #[instrument(skip(self, command), fields(name = %command.item.name))]
    pub async fn create_item(
        &self,
        command: CreateItemCommand,
    ) -> Result<consumable_item::Model, ServiceError> {
        command.validate()?;

        let txn = self
            .db_pool
            .begin()
            .await
            .map_err(ServiceError::db_error)?;
        let now = Utc::now();
        let item = insert_item_with_audit(
            &txn,
            &command.item,
            OperationKind::Create,
            &command.operator,
            command.reason.as_deref(),
            command.notes.as_deref(),
            now,
        )
        .await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        ITEM_LIFECYCLE_OPS.with_label_values(&["create"]).inc();
        info!(
            item_id = %item.id,
            name = %item.name,
            initial_stock = item.current_stock,
            "Created consumable item"
        );
        publish_best_effort(
            &self.event_sender,
            Event::ItemCreated {
                item_id: item.id,
                initial_stock: item.current_stock,
            },
        )
        .await;

        Ok(item)
    }

    /// Edits catalog fields of an item. The write is conditional on the
    /// version read at the start, so a concurrent ledger mutation surfaces
    /// as `ConcurrencyConflict` instead of silently overwriting.
    #[instrument(skip(self, command), fields(item_id = %item_id))]
    pub async fn update_item(
        &self,
        item_id: Uuid,
        command: UpdateItemCommand,
    ) -> Result<consumable_item::Model, ServiceError> {
        command.validate()?;
        if command.changes_nothing() {
            return Err(ServiceError::Validation(
                "update requires at least one field to change".to_string(),
            ));
        }

        let txn = self
            .db_pool
            .begin()
            .await
            .map_err(ServiceError::db_error)?;
        let item = ConsumableItem::find_by_id(item_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::item_not_found(item_id))?;
        let now = Utc::now();

        let mut update = consumable_item::Entity::update_many()
            .col_expr(
                consumable_item::Column::Version,
                Expr::value(item.version + 1),
            )
            .col_expr(consumable_item::Column::UpdatedAt, Expr::value(now));
        if let Some(name) = &command.name {
            update = update.col_expr(consumable_item::Column::Name, Expr::value(name.clone()));
        }
        if let Some(category) = &command.category {
            update = update.col_expr(
                consumable_item::Column::Category,
                Expr::value(category.clone()),
            );
        }
        if let Some(unit) = &command.unit {
            update = update.col_expr(consumable_item::Column::Unit, Expr::value(unit.clone()));
        }
        if let Some(min_stock) = command.min_stock {
            update = update.col_expr(consumable_item::Column::MinStock, Expr::value(min_stock));
        }
        if let Some(max_stock) = command.max_stock {
            update = update.col_expr(consumable_item::Column::MaxStock, Expr::value(max_stock));
        }
        let result = update
            .filter(consumable_item::Column::Id.eq(item.id))
            .filter(consumable_item::Column::Version.eq(item.version))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            txn.rollback().await.map_err(ServiceError::db_error)?;
            warn!(item_id = %item_id, version = item.version, "Item changed underneath a catalog edit");
            return Err(ServiceError::ConcurrencyConflict {
                item_id,
                attempts: 1,
            });
        }

        let mut updated = item;
        if let Some(name) = command.name.clone() {
            updated.name = name;
        }
        if let Some(category) = command.category.clone() {
            updated.category = category;
        }
        if let Some(unit) = command.unit.clone() {
            updated.unit = unit;
        }
        if let Some(min_stock) = command.min_stock {
            updated.min_stock = min_stock;
        }
        if let Some(max_stock) = command.max_stock {
            updated.max_stock = max_stock;
        }
        updated.version += 1;
        updated.updated_at = now;
        let audit = lifecycle_audit_entry(
            &updated,
            OperationKind::Update,
            updated.current_stock,
            &command.operator,
            command.reason.as_deref(),
            command.notes.as_deref(),
            now,
        );
        audit.insert(&txn).await.map_err(ServiceError::db_error)?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        ITEM_LIFECYCLE_OPS.with_label_values(&["update"]).inc();
        info!(item_id = %updated.id, version = updated.version, "Updated consumable item");
        publish_best_effort(
            &self.event_sender,
            Event::ItemUpdated {
                item_id: updated.id,
            },
        )
        .await;

        Ok(updated)
    }

    /// Removes an item and everything recorded about it. Movement and audit
    /// rows are deleted before the item row so the counts reported back are
    /// exact; the foreign keys would cascade the same rows anyway. There is
    /// no surviving audit entry for a deletion, callers wanting history must
    /// export the trail first.
    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn delete_item(&self, item_id: Uuid) -> Result<DeletedItemSummary, ServiceError> {
        let txn = self
            .db_pool
            .begin()
            .await
            .map_err(ServiceError::db_error)?;
        ConsumableItem::find_by_id(item_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::item_not_found(item_id))?;

        let movements_removed = stock_movement::Entity::delete_many()
            .filter(stock_movement::Column::ItemId.eq(item_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .rows_affected;
        let audit_entries_removed = audit_log::Entity::delete_many()
            .filter(audit_log::Column::ItemId.eq(item_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .rows_affected;
        let removed = ConsumableItem::delete_by_id(item_id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if removed.rows_affected == 0 {
            txn.rollback().await.map_err(ServiceError::db_error)?;
            return Err(ServiceError::item_not_found(item_id));
        }
        txn.commit().await.map_err(ServiceError::db_error)?;

        ITEM_LIFECYCLE_OPS.with_label_values(&["delete"]).inc();
        info!(
            item_id = %item_id,
            movements_removed,
            audit_entries_removed,
            "Deleted consumable item and its history"
        );
        publish_best_effort(
            &self.event_sender,
            Event::ItemDeleted {
                item_id,
                movements_removed,
                audit_entries_removed,
            },
        )
        .await;

        Ok(DeletedItemSummary {
            item_id,
            movements_removed,
            audit_entries_removed,
        })
    }

    /// Bulk-creates items in a single transaction. Either every row lands or
    /// none do. Each row follows the create path with its audit entry tagged
    /// `import` instead of `create`.
    #[instrument(skip(self, command), fields(rows = command.items.len()))]
    pub async fn import_items(
        &self,
        command: ImportItemsCommand,
    ) -> Result<Vec<consumable_item::Model>, ServiceError> {
        command.validate()?;
        if command.items.is_empty() {
            return Err(ServiceError::Validation(
                "import requires at least one item".to_string(),
            ));
        }

        let txn = self
            .db_pool
            .begin()
            .await
            .map_err(ServiceError::db_error)?;
        let now = Utc::now();
        let mut created = Vec::with_capacity(command.items.len());
        for draft in &command.items {
            let item = insert_item_with_audit(
                &txn,
                draft,
                OperationKind::Import,
                &command.operator,
                None,
                command.notes.as_deref(),
                now,
            )
            .await?;
            created.push(item);
        }
        txn.commit().await.map_err(ServiceError::db_error)?;

        ITEM_LIFECYCLE_OPS.with_label_values(&["import"]).inc();
        info!(count = created.len(), "Imported consumable items");
        publish_best_effort(
            &self.event_sender,
            Event::ItemsImported {
                item_ids: created.iter().map(|item| item.id).collect(),
            },
        )
        .await;

        Ok(created)
    }

    #[instrument(skip(self), fields(item_id = %item_id))]
    pub async fn get_item(&self, item_id: Uuid) -> Result<consumable_item::Model, ServiceError> {
        ConsumableItem::find_by_id(item_id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::item_not_found(item_id))
    }

    /// Lists the catalog one page at a time, optionally narrowed to a
    /// category and a name substring. `page` is 1-based.
    #[instrument(skip(self))]
    pub async fn list_items(
        &self,
        page: u64,
        per_page: u64,
        category: Option<&str>,
        search: Option<&str>,
    ) -> Result<ItemListPage, ServiceError> {
        let page = page.max(1);
        let per_page = per_page.max(1);

        let mut query = ConsumableItem::find().order_by_asc(consumable_item::Column::Name);
        if let Some(category) = category {
            query = query.filter(consumable_item::Column::Category.eq(category));
        }
        if let Some(search) = search {
            query = query.filter(consumable_item::Column::Name.contains(search));
        }

        let paginator = query.paginate(&*self.db_pool, per_page);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(ItemListPage {
            items,
            total,
            page,
            per_page,
        })
    }

    /// Items whose balance has fallen to or below their minimum.
    #[instrument(skip(self))]
    pub async fn list_low_stock(&self) -> Result<Vec<consumable_item::Model>, ServiceError> {
        ConsumableItem::find()
            .filter(
                Expr::col((
                    consumable_item::Entity,
                    consumable_item::Column::CurrentStock,
                ))
                .lte(Expr::col((
                    consumable_item::Entity,
                    consumable_item::Column::MinStock,
                ))),
            )
            .order_by_asc(consumable_item::Column::Name)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }
}

/// Inserts a fresh item row plus its lifecycle audit entry inside `txn`.
/// Shared by create and import, which differ only in the audit kind.
async fn insert_item_with_audit(
    txn: &DatabaseTransaction,
    draft: &ItemDraft,
    kind: OperationKind,
    operator: &str,
    reason: Option<&str>,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> Result<consumable_item::Model, ServiceError> {
    let item = consumable_item::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(draft.name.clone()),
        category: Set(draft.category.clone()),
        unit: Set(draft.unit.clone()),
        current_stock: Set(draft.initial_stock),
        min_stock: Set(draft.min_stock),
        max_stock: Set(draft.max_stock),
        version: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    };
    let item = item.insert(txn).await.map_err(ServiceError::db_error)?;

    let audit = lifecycle_audit_entry(&item, kind, 0, operator, reason, notes, now);
    audit.insert(txn).await.map_err(ServiceError::db_error)?;

    Ok(item)
}

/// Builds the editable audit entry every lifecycle operation appends. The
/// signed quantity is the balance delta, which is the opening stock for
/// create and import and zero for catalog edits.
fn lifecycle_audit_entry(
    item: &consumable_item::Model,
    kind: OperationKind,
    previous_stock: i32,
    operator: &str,
    reason: Option<&str>,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> audit_log::ActiveModel {
    audit_log::ActiveModel {
        item_id: Set(item.id),
        item_name: Set(item.name.clone()),
        operation_kind: Set(kind.as_str().to_string()),
        signed_quantity: Set(item.current_stock - previous_stock),
        previous_stock: Set(previous_stock),
        current_stock: Set(item.current_stock),
        operator: Set(operator.to_string()),
        reason: Set(reason.map(str::to_string)),
        notes: Set(notes.map(str::to_string)),
        is_editable: Set(true),
        superseded: Set(false),
        original_log_id: Set(None),
        modified_by: Set(None),
        modified_at: Set(None),
        modification_reason: Set(None),
        created_at: Set(now),
        ..Default::default()
    }
}

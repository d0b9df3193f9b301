use crate::{
    db::DbPool,
    entities::{
        audit_log, consumable_item,
        stock_movement::{self, MovementKind},
        OperationKind,
    },
    errors::ServiceError,
    events::{publish_best_effort, Event, EventSender},
};
use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec,
};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Upper bound on optimistic attempts for one mutation. Attempt number
/// three that still loses the version race is reported as a conflict.
pub const MAX_ATTEMPTS: u32 = 3;

lazy_static! {
    static ref STOCK_MUTATIONS: IntCounterVec = register_int_counter_vec!(
        "stock_mutations_total",
        "Committed stock mutations by operation",
        &["operation"]
    )
    .expect("metric can be created");
    static ref STOCK_MUTATION_FAILURES: IntCounterVec = register_int_counter_vec!(
        "stock_mutation_failures_total",
        "Rejected stock mutations by error type",
        &["error_type"]
    )
    .expect("metric can be created");
    static ref STOCK_VERSION_CONFLICTS: IntCounter = register_int_counter!(
        "stock_version_conflicts_total",
        "Lost version races observed while applying stock mutations"
    )
    .expect("metric can be created");
}

/// Request to record one receive or issue against an item.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApplyMovementCommand {
    pub item_id: Uuid,
    pub kind: MovementKind,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 128))]
    pub operator: String,
    #[validate(length(max = 512))]
    pub reason: Option<String>,
    #[validate(length(max = 128))]
    pub recipient: Option<String>,
    #[validate(length(max = 512))]
    pub notes: Option<String>,
}

/// How an adjustment interprets its quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentMode {
    Add,
    Subtract,
    Set,
}

impl AdjustmentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentMode::Add => "add",
            AdjustmentMode::Subtract => "subtract",
            AdjustmentMode::Set => "set",
        }
    }
}

/// Request to correct an item balance outside the receive/issue flow,
/// typically after a physical recount. Adjustments leave an audit entry
/// but no movement row.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApplyAdjustmentCommand {
    pub item_id: Uuid,
    pub mode: AdjustmentMode,
    pub quantity: i32,
    #[validate(length(min = 1, max = 128))]
    pub operator: String,
    #[validate(length(max = 512))]
    pub reason: Option<String>,
    #[validate(length(max = 512))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MovementOutcome {
    pub movement: stock_movement::Model,
    pub item: consumable_item::Model,
}

#[derive(Debug, Serialize)]
pub struct AdjustmentOutcome {
    pub item: consumable_item::Model,
    pub previous_stock: i32,
}

/// The balance change one attempt tries to apply.
#[derive(Debug, Clone, Copy)]
enum StockChange {
    Movement { kind: MovementKind, quantity: i32 },
    Adjustment { mode: AdjustmentMode, quantity: i32 },
}

impl StockChange {
    fn operation_kind(&self) -> OperationKind {
        match self {
            StockChange::Movement { kind, .. } => OperationKind::from(*kind),
            StockChange::Adjustment { .. } => OperationKind::Adjust,
        }
    }
}

/// Outcome of a single optimistic attempt. Business rejections and
/// storage faults do not show up here, they abort the whole mutation
/// through `Err` instead.
enum AttemptOutcome<T> {
    /// The conditional update matched and the attempt committed.
    Committed(T),
    /// Another writer bumped the version between read and update.
    Conflict,
}

/// What one committed attempt wrote.
struct CommittedMutation {
    item: consumable_item::Model,
    movement: Option<stock_movement::Model>,
    previous_stock: i32,
}

/// Computes the attempt's target balance from a fresh item snapshot, or
/// the terminal rejection for it. Rejections returned here are final
/// business outcomes and must not be retried.
fn compute_next(item: &consumable_item::Model, change: &StockChange) -> Result<i32, ServiceError> {
    match change {
        StockChange::Movement { kind, quantity } => match kind {
            MovementKind::Receive => Ok(item.current_stock + quantity),
            MovementKind::Issue => {
                let next = item.current_stock - quantity;
                if next < 0 {
                    Err(ServiceError::InsufficientStock {
                        item_id: item.id,
                        requested: *quantity,
                        available: item.current_stock,
                    })
                } else {
                    Ok(next)
                }
            }
        },
        StockChange::Adjustment { mode, quantity } => {
            if *quantity < 0 {
                return Err(ServiceError::InvalidAdjustment {
                    item_id: item.id,
                    mode: mode.as_str(),
                    quantity: *quantity,
                    current_stock: item.current_stock,
                });
            }
            match mode {
                AdjustmentMode::Add => Ok(item.current_stock + quantity),
                AdjustmentMode::Subtract => {
                    let next = item.current_stock - quantity;
                    if next < 0 {
                        Err(ServiceError::InvalidAdjustment {
                            item_id: item.id,
                            mode: mode.as_str(),
                            quantity: *quantity,
                            current_stock: item.current_stock,
                        })
                    } else {
                        Ok(next)
                    }
                }
                AdjustmentMode::Set => Ok(*quantity),
            }
        }
    }
}

fn failure_label(err: &ServiceError) -> &'static str {
    match err {
        ServiceError::NotFound { .. } => "not_found",
        ServiceError::InsufficientStock { .. } => "insufficient_stock",
        ServiceError::InvalidAdjustment { .. } => "invalid_adjustment",
        ServiceError::ConcurrencyConflict { .. } => "concurrency_conflict",
        ServiceError::OperationTimeout { .. } => "timeout",
        ServiceError::Validation(_) => "validation",
        _ => "storage",
    }
}

/// Single writer path for item balances. Every stock change flows through
/// here so the version check, the movement row, and the audit row land in
/// one transaction or not at all.
#[derive(Clone)]
pub struct StockLedgerService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    mutation_timeout: Option<Duration>,
}

impl StockLedgerService {
    /// Creates a new stock ledger service instance. `mutation_timeout`
    /// bounds one whole mutation including its retry attempts; `None`
    /// leaves it unbounded.
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        mutation_timeout: Option<Duration>,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            mutation_timeout,
        }
    }

    /// Records a receive or issue movement and returns the written
    /// movement row together with the refreshed item.
    #[instrument(skip(self, command), fields(item_id = %command.item_id, kind = command.kind.as_str()))]
    pub async fn apply_movement(
        &self,
        command: ApplyMovementCommand,
    ) -> Result<MovementOutcome, ServiceError> {
        if let Err(e) = command.validate() {
            STOCK_MUTATION_FAILURES
                .with_label_values(&["validation"])
                .inc();
            return Err(e.into());
        }

        let change = StockChange::Movement {
            kind: command.kind,
            quantity: command.quantity,
        };
        let committed = match self
            .mutate(
                command.item_id,
                change,
                &command.operator,
                command.reason.as_deref(),
                command.recipient.as_deref(),
                command.notes.as_deref(),
            )
            .await
        {
            Ok(committed) => committed,
            Err(err) => {
                STOCK_MUTATION_FAILURES
                    .with_label_values(&[failure_label(&err)])
                    .inc();
                return Err(err);
            }
        };

        STOCK_MUTATIONS
            .with_label_values(&[command.kind.as_str()])
            .inc();

        let movement = committed.movement.ok_or_else(|| {
            ServiceError::Internal("movement row missing after committed mutation".to_string())
        })?;
        let item = committed.item;

        info!(
            item_id = %item.id,
            movement_id = %movement.id,
            quantity = command.quantity,
            previous_stock = committed.previous_stock,
            current_stock = item.current_stock,
            version = item.version,
            "Stock movement committed"
        );

        let event = match command.kind {
            MovementKind::Receive => Event::StockReceived {
                item_id: item.id,
                movement_id: movement.id,
                quantity: command.quantity,
                previous_stock: committed.previous_stock,
                current_stock: item.current_stock,
            },
            MovementKind::Issue => Event::StockIssued {
                item_id: item.id,
                movement_id: movement.id,
                quantity: command.quantity,
                previous_stock: committed.previous_stock,
                current_stock: item.current_stock,
                recipient: command.recipient.clone(),
            },
        };
        publish_best_effort(&self.event_sender, event).await;
        self.notify_if_low(&item).await;

        Ok(MovementOutcome { movement, item })
    }

    /// Corrects an item balance in add, subtract or set mode.
    #[instrument(skip(self, command), fields(item_id = %command.item_id, mode = command.mode.as_str()))]
    pub async fn apply_adjustment(
        &self,
        command: ApplyAdjustmentCommand,
    ) -> Result<AdjustmentOutcome, ServiceError> {
        if let Err(e) = command.validate() {
            STOCK_MUTATION_FAILURES
                .with_label_values(&["validation"])
                .inc();
            return Err(e.into());
        }

        let change = StockChange::Adjustment {
            mode: command.mode,
            quantity: command.quantity,
        };
        let committed = match self
            .mutate(
                command.item_id,
                change,
                &command.operator,
                command.reason.as_deref(),
                None,
                command.notes.as_deref(),
            )
            .await
        {
            Ok(committed) => committed,
            Err(err) => {
                STOCK_MUTATION_FAILURES
                    .with_label_values(&[failure_label(&err)])
                    .inc();
                return Err(err);
            }
        };

        STOCK_MUTATIONS.with_label_values(&["adjust"]).inc();

        let item = committed.item;
        info!(
            item_id = %item.id,
            mode = command.mode.as_str(),
            quantity = command.quantity,
            previous_stock = committed.previous_stock,
            current_stock = item.current_stock,
            version = item.version,
            "Stock adjustment committed"
        );

        publish_best_effort(
            &self.event_sender,
            Event::StockAdjusted {
                item_id: item.id,
                mode: command.mode.as_str().to_string(),
                previous_stock: committed.previous_stock,
                current_stock: item.current_stock,
            },
        )
        .await;
        self.notify_if_low(&item).await;

        Ok(AdjustmentOutcome {
            item,
            previous_stock: committed.previous_stock,
        })
    }

    /// Runs the retry loop under the configured deadline. A mutation cut
    /// off mid-attempt drops its open transaction, which rolls back, so
    /// the deadline can never leave a half-written attempt behind.
    async fn mutate(
        &self,
        item_id: Uuid,
        change: StockChange,
        operator: &str,
        reason: Option<&str>,
        recipient: Option<&str>,
        notes: Option<&str>,
    ) -> Result<CommittedMutation, ServiceError> {
        match self.mutation_timeout {
            Some(limit) => {
                let started = std::time::Instant::now();
                match tokio::time::timeout(
                    limit,
                    self.mutate_with_retries(item_id, change, operator, reason, recipient, notes),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => {
                        error!(
                            item_id = %item_id,
                            limit_ms = limit.as_millis() as u64,
                            "Stock mutation exceeded its deadline"
                        );
                        Err(ServiceError::OperationTimeout {
                            item_id,
                            elapsed_ms: started.elapsed().as_millis() as u64,
                        })
                    }
                }
            }
            None => {
                self.mutate_with_retries(item_id, change, operator, reason, recipient, notes)
                    .await
            }
        }
    }

    /// Attempt counter state machine: each pass opens a fresh transaction,
    /// re-reads the item and tries the conditional update once. Only a
    /// lost version race loops; every other failure is terminal.
    async fn mutate_with_retries(
        &self,
        item_id: Uuid,
        change: StockChange,
        operator: &str,
        reason: Option<&str>,
        recipient: Option<&str>,
        notes: Option<&str>,
    ) -> Result<CommittedMutation, ServiceError> {
        let mut attempt: u32 = 1;
        loop {
            match self
                .try_apply_once(item_id, change, operator, reason, recipient, notes)
                .await?
            {
                AttemptOutcome::Committed(committed) => return Ok(committed),
                AttemptOutcome::Conflict => {
                    STOCK_VERSION_CONFLICTS.inc();
                    warn!(
                        item_id = %item_id,
                        attempt,
                        "Conditional update matched no row, lost a version race"
                    );
                    if attempt >= MAX_ATTEMPTS {
                        return Err(ServiceError::ConcurrencyConflict {
                            item_id,
                            attempts: attempt,
                        });
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// One optimistic attempt. The version read here is the fence: the
    /// update only matches while no other writer has bumped it, and the
    /// movement and audit rows commit together with the balance or not
    /// at all.
    async fn try_apply_once(
        &self,
        item_id: Uuid,
        change: StockChange,
        operator: &str,
        reason: Option<&str>,
        recipient: Option<&str>,
        notes: Option<&str>,
    ) -> Result<AttemptOutcome<CommittedMutation>, ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let item = consumable_item::Entity::find_by_id(item_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::item_not_found(item_id))?;

        let next_stock = compute_next(&item, &change)?;
        let now = Utc::now();

        let update = consumable_item::Entity::update_many()
            .col_expr(consumable_item::Column::CurrentStock, Expr::value(next_stock))
            .col_expr(consumable_item::Column::Version, Expr::value(item.version + 1))
            .col_expr(consumable_item::Column::UpdatedAt, Expr::value(now))
            .filter(consumable_item::Column::Id.eq(item.id))
            .filter(consumable_item::Column::Version.eq(item.version))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        if update.rows_affected == 0 {
            txn.rollback().await.map_err(ServiceError::db_error)?;
            return Ok(AttemptOutcome::Conflict);
        }

        let movement = match change {
            StockChange::Movement { kind, quantity } => {
                let row = stock_movement::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    item_id: Set(item.id),
                    kind: Set(kind.as_str().to_string()),
                    quantity: Set(quantity),
                    previous_stock: Set(item.current_stock),
                    current_stock: Set(next_stock),
                    operator: Set(operator.to_string()),
                    reason: Set(reason.map(str::to_string)),
                    recipient: Set(recipient.map(str::to_string)),
                    notes: Set(notes.map(str::to_string)),
                    created_at: Set(now),
                };
                Some(row.insert(&txn).await.map_err(ServiceError::db_error)?)
            }
            StockChange::Adjustment { .. } => None,
        };

        let audit = audit_log::ActiveModel {
            item_id: Set(item.id),
            item_name: Set(item.name.clone()),
            operation_kind: Set(change.operation_kind().as_str().to_string()),
            signed_quantity: Set(next_stock - item.current_stock),
            previous_stock: Set(item.current_stock),
            current_stock: Set(next_stock),
            operator: Set(operator.to_string()),
            reason: Set(reason.map(str::to_string)),
            notes: Set(notes.map(str::to_string)),
            is_editable: Set(false),
            superseded: Set(false),
            original_log_id: Set(None),
            modified_by: Set(None),
            modified_at: Set(None),
            modification_reason: Set(None),
            created_at: Set(now),
            ..Default::default()
        };
        audit.insert(&txn).await.map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        let previous_stock = item.current_stock;
        let mut updated_item = item;
        updated_item.current_stock = next_stock;
        updated_item.version += 1;
        updated_item.updated_at = now;

        Ok(AttemptOutcome::Committed(CommittedMutation {
            item: updated_item,
            movement,
            previous_stock,
        }))
    }

    async fn notify_if_low(&self, item: &consumable_item::Model) {
        if item.is_low_stock() {
            warn!(
                item_id = %item.id,
                name = %item.name,
                current_stock = item.current_stock,
                min_stock = item.min_stock,
                "Item at or below its minimum stock level"
            );
            publish_best_effort(
                &self.event_sender,
                Event::LowStockDetected {
                    item_id: item.id,
                    name: item.name.clone(),
                    current_stock: item.current_stock,
                    min_stock: item.min_stock,
                },
            )
            .await;
        }
    }
}

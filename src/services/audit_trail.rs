use crate::db::DbPool;
use crate::entities::audit_log::{self, Entity as AuditLog};
use crate::errors::ServiceError;
use crate::events::{publish_best_effort, Event, EventSender};
use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::{register_int_counter, IntCounter};
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

lazy_static! {
    static ref AUDIT_AMENDMENTS: IntCounter = register_int_counter!(
        "audit_amendments_total",
        "Committed amendments to editable audit entries"
    )
    .expect("metric can be created");
}

/// A correction to the descriptive fields of an editable audit entry.
/// Stock figures are not part of the command; amendments never touch them.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AmendEntryCommand {
    #[validate(length(min = 1, max = 128))]
    pub modified_by: String,
    #[validate(length(min = 1, max = 512))]
    pub modification_reason: String,
    #[validate(length(max = 512))]
    pub reason: Option<String>,
    #[validate(length(max = 1024))]
    pub notes: Option<String>,
}

impl AmendEntryCommand {
    fn changes_nothing(&self) -> bool {
        self.reason.is_none() && self.notes.is_none()
    }
}

#[derive(Clone)]
pub struct AuditTrailService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl AuditTrailService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Corrects an editable audit entry by appending a replacement rather
    /// than mutating the stored row. The new entry keeps the original's
    /// ledger figures verbatim, carries the corrected reason and notes, and
    /// points back at the original through `original_log_id`. The original
    /// is flagged superseded in the same transaction; the flip is
    /// conditional on it not already being superseded, so two concurrent
    /// amendments cannot both attach to one entry.
    #[instrument(skip(self, command), fields(entry_id = entry_id, modified_by = %command.modified_by))]
    pub async fn amend_entry(
        &self,
        entry_id: i64,
        command: AmendEntryCommand,
    ) -> Result<audit_log::Model, ServiceError> {
        command.validate()?;
        if command.changes_nothing() {
            return Err(ServiceError::Validation(
                "amendment requires a corrected reason or notes".to_string(),
            ));
        }

        let txn = self
            .db_pool
            .begin()
            .await
            .map_err(ServiceError::db_error)?;
        let original = AuditLog::find_by_id(entry_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::audit_entry_not_found(entry_id))?;
        if !original.is_amendable() {
            let reason = if original.superseded {
                "entry has already been superseded by an amendment"
            } else {
                "entry was written by the stock ledger and is sealed"
            };
            return Err(ServiceError::NotAmendable {
                entry_id,
                reason: reason.to_string(),
            });
        }

        let now = Utc::now();
        let amendment = audit_log::ActiveModel {
            item_id: Set(original.item_id),
            item_name: Set(original.item_name.clone()),
            operation_kind: Set(original.operation_kind.clone()),
            signed_quantity: Set(original.signed_quantity),
            previous_stock: Set(original.previous_stock),
            current_stock: Set(original.current_stock),
            operator: Set(original.operator.clone()),
            reason: Set(command.reason.clone().or_else(|| original.reason.clone())),
            notes: Set(command.notes.clone().or_else(|| original.notes.clone())),
            is_editable: Set(true),
            superseded: Set(false),
            original_log_id: Set(Some(original.id)),
            modified_by: Set(Some(command.modified_by.clone())),
            modified_at: Set(Some(now)),
            modification_reason: Set(Some(command.modification_reason.clone())),
            created_at: Set(now),
            ..Default::default()
        };
        let amendment = amendment
            .insert(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        let marked = AuditLog::update_many()
            .col_expr(audit_log::Column::Superseded, Expr::value(true))
            .filter(audit_log::Column::Id.eq(original.id))
            .filter(audit_log::Column::Superseded.eq(false))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if marked.rows_affected == 0 {
            txn.rollback().await.map_err(ServiceError::db_error)?;
            return Err(ServiceError::NotAmendable {
                entry_id,
                reason: "entry was superseded by a concurrent amendment".to_string(),
            });
        }
        txn.commit().await.map_err(ServiceError::db_error)?;

        AUDIT_AMENDMENTS.inc();
        info!(
            original_entry_id = original.id,
            amended_entry_id = amendment.id,
            item_id = %amendment.item_id,
            "Amended audit entry"
        );
        publish_best_effort(
            &self.event_sender,
            Event::AuditEntryAmended {
                original_entry_id: original.id,
                amended_entry_id: amendment.id,
                item_id: amendment.item_id,
                occurred_at: now,
            },
        )
        .await;

        Ok(amendment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amendments_must_change_something() {
        let noop = AmendEntryCommand {
            modified_by: "dave".to_string(),
            modification_reason: "typo".to_string(),
            reason: None,
            notes: None,
        };
        assert!(noop.changes_nothing());
        assert!(noop.validate().is_ok());

        let fix = AmendEntryCommand {
            notes: Some("issued to rack B-12, not B-21".to_string()),
            ..noop
        };
        assert!(!fix.changes_nothing());
    }

    #[test]
    fn amendments_require_an_explanation() {
        let unexplained = AmendEntryCommand {
            modified_by: "dave".to_string(),
            modification_reason: String::new(),
            reason: Some("correct reason".to_string()),
            notes: None,
        };
        assert!(unexplained.validate().is_err());
    }
}

mod common;

use assert_matches::assert_matches;
use stockroom_api::entities::stock_movement::MovementKind;
use stockroom_api::errors::ServiceError;
use stockroom_api::queries::{
    GetAmendmentChainQuery, GetAuditEntryQuery, GetItemAuditTrailQuery, Query,
};
use stockroom_api::services::{AmendEntryCommand, ApplyMovementCommand};
use uuid::Uuid;

use common::TestApp;

fn amendment(reason: &str) -> AmendEntryCommand {
    AmendEntryCommand {
        modified_by: "supervisor".to_string(),
        modification_reason: "typo in the original note".to_string(),
        reason: Some(reason.to_string()),
        notes: None,
    }
}

async fn opening_entry_id(app: &TestApp, item_id: Uuid) -> i64 {
    let trail = GetItemAuditTrailQuery {
        item_id,
        operation_kind: None,
        start_date: None,
        end_date: None,
        limit: 10,
        offset: 0,
    }
    .execute(app.state.db.as_ref())
    .await
    .expect("audit trail");
    trail
        .iter()
        .find(|e| e.operation_kind == "create")
        .expect("opening entry")
        .id
}

#[tokio::test]
async fn amending_appends_a_successor_and_seals_the_original() {
    let app = TestApp::new().await;
    let item = app.seed_item("torx bit set", 6).await;
    let original_id = opening_entry_id(&app, item.id).await;

    let amended = app
        .state
        .services
        .audit_trail
        .amend_entry(original_id, amendment("received with supplier invoice 4411"))
        .await
        .expect("amend entry");

    assert_eq!(amended.original_log_id, Some(original_id));
    assert_eq!(
        amended.reason.as_deref(),
        Some("received with supplier invoice 4411")
    );
    assert_eq!(amended.modified_by.as_deref(), Some("supervisor"));
    assert_eq!(
        amended.modification_reason.as_deref(),
        Some("typo in the original note")
    );
    assert!(amended.modified_at.is_some());
    assert!(amended.is_editable);
    assert!(!amended.superseded);

    // Stock figures are copied verbatim; an amendment never rewrites what
    // happened to the balance.
    let original = GetAuditEntryQuery {
        entry_id: original_id,
    }
    .execute(app.state.db.as_ref())
    .await
    .expect("original entry");
    assert!(original.superseded);
    assert_eq!(amended.previous_stock, original.previous_stock);
    assert_eq!(amended.current_stock, original.current_stock);
    assert_eq!(amended.signed_quantity, original.signed_quantity);
    assert_eq!(amended.operator, original.operator);
}

#[tokio::test]
async fn ledger_written_entries_are_sealed_against_amendment() {
    let app = TestApp::new().await;
    let item = app.seed_item("SATA cable", 20).await;

    app.state
        .services
        .stock_ledger
        .apply_movement(ApplyMovementCommand {
            item_id: item.id,
            kind: MovementKind::Receive,
            quantity: 5,
            operator: "warehouse".to_string(),
            reason: None,
            recipient: None,
            notes: None,
        })
        .await
        .expect("receive");

    let trail = GetItemAuditTrailQuery {
        item_id: item.id,
        operation_kind: None,
        start_date: None,
        end_date: None,
        limit: 10,
        offset: 0,
    }
    .execute(app.state.db.as_ref())
    .await
    .expect("audit trail");
    let sealed = trail.iter().find(|e| !e.is_editable).expect("sealed entry");

    let err = app
        .state
        .services
        .audit_trail
        .amend_entry(sealed.id, amendment("should not work"))
        .await
        .expect_err("sealed entry");
    assert_matches!(err, ServiceError::NotAmendable { .. });
}

#[tokio::test]
async fn superseded_entries_cannot_be_amended_twice() {
    let app = TestApp::new().await;
    let item = app.seed_item("cable comb", 4).await;
    let original_id = opening_entry_id(&app, item.id).await;

    app.state
        .services
        .audit_trail
        .amend_entry(original_id, amendment("first correction"))
        .await
        .expect("first amendment");

    let err = app
        .state
        .services
        .audit_trail
        .amend_entry(original_id, amendment("second correction"))
        .await
        .expect_err("superseded original");
    assert_matches!(err, ServiceError::NotAmendable { .. });
}

#[tokio::test]
async fn amendment_chains_read_oldest_first_from_any_link() {
    let app = TestApp::new().await;
    let item = app.seed_item("grounding strap", 9).await;
    let original_id = opening_entry_id(&app, item.id).await;
    let audit = &app.state.services.audit_trail;

    let first = audit
        .amend_entry(original_id, amendment("first correction"))
        .await
        .expect("first amendment");
    let second = audit
        .amend_entry(first.id, amendment("second correction"))
        .await
        .expect("second amendment");

    // Walking from the middle link still yields the full chain.
    let chain = GetAmendmentChainQuery { entry_id: first.id }
        .execute(app.state.db.as_ref())
        .await
        .expect("chain");
    assert_eq!(chain.len(), 3);
    assert_eq!(chain[0].id, original_id);
    assert_eq!(chain[1].id, first.id);
    assert_eq!(chain[2].id, second.id);
    assert!(chain[0].superseded);
    assert!(chain[1].superseded);
    assert!(!chain[2].superseded);
}

#[tokio::test]
async fn amendments_require_a_correction_and_an_existing_entry() {
    let app = TestApp::new().await;
    let item = app.seed_item("zip tie bag", 2).await;
    let original_id = opening_entry_id(&app, item.id).await;
    let audit = &app.state.services.audit_trail;

    let err = audit
        .amend_entry(
            original_id,
            AmendEntryCommand {
                modified_by: "supervisor".to_string(),
                modification_reason: "no actual change".to_string(),
                reason: None,
                notes: None,
            },
        )
        .await
        .expect_err("empty correction");
    assert_matches!(err, ServiceError::Validation(_));

    let err = audit
        .amend_entry(i64::MAX, amendment("no such entry"))
        .await
        .expect_err("unknown entry");
    assert_matches!(err, ServiceError::NotFound { .. });
}

#[tokio::test]
async fn amendments_keep_original_fields_they_do_not_correct() {
    let app = TestApp::new().await;

    let item = app
        .state
        .services
        .item_catalog
        .create_item(stockroom_api::services::CreateItemCommand {
            item: stockroom_api::services::ItemDraft {
                name: "fiber spool".to_string(),
                category: "optics".to_string(),
                unit: "meter".to_string(),
                initial_stock: 300,
                min_stock: 50,
                max_stock: 2_000,
            },
            operator: "receiving".to_string(),
            reason: Some("initial survey".to_string()),
            notes: Some("spool stored in cage 7".to_string()),
        })
        .await
        .expect("create item");
    let original_id = opening_entry_id(&app, item.id).await;

    // Correct only the notes; the reason must carry over unchanged.
    let amended = app
        .state
        .services
        .audit_trail
        .amend_entry(
            original_id,
            AmendEntryCommand {
                modified_by: "supervisor".to_string(),
                modification_reason: "wrong cage number".to_string(),
                reason: None,
                notes: Some("spool stored in cage 9".to_string()),
            },
        )
        .await
        .expect("amend entry");

    assert_eq!(amended.reason.as_deref(), Some("initial survey"));
    assert_eq!(amended.notes.as_deref(), Some("spool stored in cage 9"));
}

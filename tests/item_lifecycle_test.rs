mod common;

use assert_matches::assert_matches;
use stockroom_api::entities::stock_movement::MovementKind;
use stockroom_api::errors::ServiceError;
use stockroom_api::queries::{GetItemAuditTrailQuery, GetItemMovementsQuery, Query};
use stockroom_api::services::{
    ApplyMovementCommand, CreateItemCommand, ImportItemsCommand, ItemDraft, UpdateItemCommand,
};
use uuid::Uuid;

use common::TestApp;

fn draft(name: &str, initial_stock: i32) -> ItemDraft {
    ItemDraft {
        name: name.to_string(),
        category: "spares".to_string(),
        unit: "piece".to_string(),
        initial_stock,
        min_stock: 2,
        max_stock: 500,
    }
}

fn update_command() -> UpdateItemCommand {
    UpdateItemCommand {
        name: None,
        category: None,
        unit: None,
        min_stock: None,
        max_stock: None,
        operator: "catalog".to_string(),
        reason: None,
        notes: None,
    }
}

async fn trail(app: &TestApp, item_id: Uuid) -> Vec<stockroom_api::entities::audit_log::Model> {
    GetItemAuditTrailQuery {
        item_id,
        operation_kind: None,
        start_date: None,
        end_date: None,
        limit: 50,
        offset: 0,
    }
    .execute(app.state.db.as_ref())
    .await
    .expect("audit trail")
}

#[tokio::test]
async fn creating_an_item_opens_the_ledger_with_an_editable_entry() {
    let app = TestApp::new().await;

    let item = app
        .state
        .services
        .item_catalog
        .create_item(CreateItemCommand {
            item: draft("PSU 800W", 12),
            operator: "receiving".to_string(),
            reason: Some("new supplier batch".to_string()),
            notes: None,
        })
        .await
        .expect("create item");

    assert_eq!(item.current_stock, 12);
    assert_eq!(item.version, 0);

    let entries = trail(&app, item.id).await;
    assert_eq!(entries.len(), 1);
    let opening = &entries[0];
    assert_eq!(opening.operation_kind, "create");
    assert_eq!(opening.previous_stock, 0);
    assert_eq!(opening.current_stock, 12);
    assert_eq!(opening.signed_quantity, 12);
    assert_eq!(opening.operator, "receiving");
    assert!(opening.is_editable);
}

#[tokio::test]
async fn updating_catalog_fields_leaves_the_balance_untouched() {
    let app = TestApp::new().await;
    let item = app.seed_item("HDD caddy", 30).await;

    let updated = app
        .state
        .services
        .item_catalog
        .update_item(
            item.id,
            UpdateItemCommand {
                name: Some("HDD caddy 3.5in".to_string()),
                min_stock: Some(10),
                ..update_command()
            },
        )
        .await
        .expect("update item");

    assert_eq!(updated.name, "HDD caddy 3.5in");
    assert_eq!(updated.min_stock, 10);
    assert_eq!(updated.current_stock, 30);
    assert_eq!(updated.version, 1);
    // Untouched fields carry over.
    assert_eq!(updated.category, item.category);
    assert_eq!(updated.unit, item.unit);

    let entries = trail(&app, item.id).await;
    let edit = entries
        .iter()
        .find(|e| e.operation_kind == "update")
        .expect("update entry");
    assert_eq!(edit.signed_quantity, 0);
    assert_eq!(edit.previous_stock, 30);
    assert_eq!(edit.current_stock, 30);
    assert!(edit.is_editable);
}

#[tokio::test]
async fn updates_need_at_least_one_field_and_an_existing_item() {
    let app = TestApp::new().await;
    let item = app.seed_item("label tape", 3).await;

    let err = app
        .state
        .services
        .item_catalog
        .update_item(item.id, update_command())
        .await
        .expect_err("empty update");
    assert_matches!(err, ServiceError::Validation(_));

    let err = app
        .state
        .services
        .item_catalog
        .update_item(
            Uuid::new_v4(),
            UpdateItemCommand {
                name: Some("ghost".to_string()),
                ..update_command()
            },
        )
        .await
        .expect_err("unknown item");
    assert_matches!(err, ServiceError::NotFound { .. });
}

#[tokio::test]
async fn deleting_an_item_takes_its_whole_history_with_it() {
    let app = TestApp::new().await;
    let item = app.seed_item("console cable", 25).await;
    let ledger = &app.state.services.stock_ledger;

    ledger
        .apply_movement(ApplyMovementCommand {
            item_id: item.id,
            kind: MovementKind::Receive,
            quantity: 10,
            operator: "warehouse".to_string(),
            reason: None,
            recipient: None,
            notes: None,
        })
        .await
        .expect("receive");
    ledger
        .apply_movement(ApplyMovementCommand {
            item_id: item.id,
            kind: MovementKind::Issue,
            quantity: 4,
            operator: "warehouse".to_string(),
            reason: None,
            recipient: Some("noc".to_string()),
            notes: None,
        })
        .await
        .expect("issue");

    let summary = app
        .state
        .services
        .item_catalog
        .delete_item(item.id)
        .await
        .expect("delete item");

    assert_eq!(summary.item_id, item.id);
    assert_eq!(summary.movements_removed, 2);
    // Opening entry plus one sealed entry per movement.
    assert_eq!(summary.audit_entries_removed, 3);

    let err = app
        .state
        .services
        .item_catalog
        .get_item(item.id)
        .await
        .expect_err("item is gone");
    assert_matches!(err, ServiceError::NotFound { .. });

    assert!(trail(&app, item.id).await.is_empty());
    let movements = GetItemMovementsQuery {
        item_id: item.id,
        kind: None,
        start_date: None,
        end_date: None,
        limit: 10,
        offset: 0,
    }
    .execute(app.state.db.as_ref())
    .await
    .expect("movements");
    assert!(movements.is_empty());

    let err = app
        .state
        .services
        .item_catalog
        .delete_item(item.id)
        .await
        .expect_err("second delete");
    assert_matches!(err, ServiceError::NotFound { .. });
}

#[tokio::test]
async fn importing_creates_every_row_with_an_import_entry() {
    let app = TestApp::new().await;

    let created = app
        .state
        .services
        .item_catalog
        .import_items(ImportItemsCommand {
            items: vec![
                draft("QSFP module", 40),
                draft("fan tray", 8),
                draft("blanking panel", 120),
            ],
            operator: "migration".to_string(),
            notes: Some("legacy stockroom export".to_string()),
        })
        .await
        .expect("import items");

    assert_eq!(created.len(), 3);
    for item in &created {
        assert_eq!(item.version, 0);
        let entries = trail(&app, item.id).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].operation_kind, "import");
        assert_eq!(entries[0].previous_stock, 0);
        assert_eq!(entries[0].current_stock, item.current_stock);
        assert!(entries[0].is_editable);
    }
}

#[tokio::test]
async fn imports_reject_empty_and_invalid_batches_as_a_whole() {
    let app = TestApp::new().await;
    let catalog = &app.state.services.item_catalog;

    let err = catalog
        .import_items(ImportItemsCommand {
            items: vec![],
            operator: "migration".to_string(),
            notes: None,
        })
        .await
        .expect_err("empty import");
    assert_matches!(err, ServiceError::Validation(_));

    // One bad row poisons the whole batch; nothing is created.
    let err = catalog
        .import_items(ImportItemsCommand {
            items: vec![draft("good row", 5), draft("bad row", -1)],
            operator: "migration".to_string(),
            notes: None,
        })
        .await
        .expect_err("negative opening balance");
    assert_matches!(err, ServiceError::Validation(_));

    let page = catalog
        .list_items(1, 50, None, None)
        .await
        .expect("list items");
    assert_eq!(page.total, 0);
}

#[tokio::test]
async fn listings_paginate_and_filter_by_category() {
    let app = TestApp::new().await;
    let catalog = &app.state.services.item_catalog;

    for name in ["alpha", "bravo", "charlie"] {
        catalog
            .create_item(CreateItemCommand {
                item: draft(name, 10),
                operator: "catalog".to_string(),
                reason: None,
                notes: None,
            })
            .await
            .expect("create");
    }
    catalog
        .create_item(CreateItemCommand {
            item: ItemDraft {
                category: "optics".to_string(),
                ..draft("delta", 10)
            },
            operator: "catalog".to_string(),
            reason: None,
            notes: None,
        })
        .await
        .expect("create");

    let page = catalog
        .list_items(1, 2, None, None)
        .await
        .expect("first page");
    assert_eq!(page.total, 4);
    assert_eq!(page.items.len(), 2);
    // Name-ordered listing.
    assert_eq!(page.items[0].name, "alpha");
    assert_eq!(page.items[1].name, "bravo");

    let optics = catalog
        .list_items(1, 10, Some("optics"), None)
        .await
        .expect("filtered page");
    assert_eq!(optics.total, 1);
    assert_eq!(optics.items[0].name, "delta");

    let matches = catalog
        .list_items(1, 10, None, Some("rav"))
        .await
        .expect("searched page");
    assert_eq!(matches.total, 1);
    assert_eq!(matches.items[0].name, "bravo");
}

#[tokio::test]
async fn low_stock_listing_flags_items_at_or_below_their_minimum() {
    let app = TestApp::new().await;
    let catalog = &app.state.services.item_catalog;

    catalog
        .create_item(CreateItemCommand {
            item: ItemDraft {
                min_stock: 10,
                ..draft("running low", 10)
            },
            operator: "catalog".to_string(),
            reason: None,
            notes: None,
        })
        .await
        .expect("create low item");
    catalog
        .create_item(CreateItemCommand {
            item: ItemDraft {
                min_stock: 10,
                ..draft("well stocked", 50)
            },
            operator: "catalog".to_string(),
            reason: None,
            notes: None,
        })
        .await
        .expect("create stocked item");

    let low = catalog.list_low_stock().await.expect("low stock listing");
    assert_eq!(low.len(), 1);
    assert_eq!(low[0].name, "running low");
}

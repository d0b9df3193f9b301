mod common;

use axum::{body, http::Method, response::Response};
use serde_json::{json, Value};

use common::TestApp;

async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

#[tokio::test]
async fn stockroom_flow_over_http() {
    let app = TestApp::new().await;

    // Create an item with an opening balance
    let create_payload = json!({
        "name": "SSD 960GB",
        "category": "storage",
        "unit": "piece",
        "initial_stock": 100,
        "min_stock": 10,
        "max_stock": 400,
        "operator": "receiving",
        "reason": "new supplier batch"
    });
    let response = app
        .request(Method::POST, "/api/v1/items", Some(create_payload))
        .await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    assert!(body["success"].as_bool().unwrap());
    assert_eq!(body["data"]["current_stock"], 100);
    assert_eq!(body["data"]["version"], 0);
    let item_id = body["data"]["id"].as_str().expect("item id").to_string();

    // Receive 50 more
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/items/{item_id}/receive"),
            Some(json!({"quantity": 50, "operator": "warehouse"})),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["item"]["current_stock"], 150);
    assert_eq!(body["data"]["item"]["version"], 1);
    assert_eq!(body["data"]["movement"]["previous_stock"], 100);
    assert_eq!(body["data"]["movement"]["kind"], "receive");

    // Issue 30 to a recipient
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/items/{item_id}/issue"),
            Some(json!({
                "quantity": 30,
                "operator": "warehouse",
                "recipient": "dc-ops",
                "reason": "rack build"
            })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["item"]["current_stock"], 120);
    assert_eq!(body["data"]["movement"]["recipient"], "dc-ops");

    // Cycle count: subtract 20
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/items/{item_id}/adjust"),
            Some(json!({
                "mode": "subtract",
                "quantity": 20,
                "operator": "auditor",
                "reason": "cycle count"
            })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["item"]["current_stock"], 100);
    assert_eq!(body["data"]["previous_stock"], 120);

    // Movements list only the receive and the issue; adjustments are
    // audit-only.
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/items/{item_id}/movements"),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/items/{item_id}/movements?kind=issue"),
            None,
        )
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["quantity"], 30);

    // The audit trail carries one sealed entry per committed mutation
    let response = app
        .request(Method::GET, &format!("/api/v1/items/{item_id}/audit"), None)
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    let entries = body["data"].as_array().unwrap();
    let sealed = entries
        .iter()
        .filter(|e| !e["is_editable"].as_bool().unwrap())
        .count();
    assert_eq!(sealed, 3);

    // Rename and raise the reorder threshold
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/items/{item_id}"),
            Some(json!({
                "name": "SSD 960GB SATA",
                "min_stock": 40,
                "operator": "catalog"
            })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["name"], "SSD 960GB SATA");
    assert_eq!(body["data"]["version"], 4);
    assert_eq!(body["data"]["current_stock"], 100);

    // Paginated listing
    let response = app
        .request(Method::GET, "/api/v1/items?page=1&limit=10", None)
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["total_pages"], 1);
    assert_eq!(body["data"]["items"][0]["name"], "SSD 960GB SATA");

    // Delete takes the history with it
    let response = app
        .request(Method::DELETE, &format!("/api/v1/items/{item_id}"), None)
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["data"]["movements_removed"], 2);
    assert_eq!(body["data"]["audit_entries_removed"], 5);

    let response = app
        .request(Method::GET, &format!("/api/v1/items/{item_id}"), None)
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn rejected_issues_report_the_shortfall() {
    let app = TestApp::new().await;
    let item = app.seed_item("raid controller", 10).await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/items/{}/issue", item.id),
            Some(json!({"quantity": 50, "operator": "warehouse"})),
        )
        .await;
    assert_eq!(response.status(), 422);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Unprocessable Entity");
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("requested 50"));
    assert!(message.contains("available 10"));

    // The shelf is untouched
    let response = app
        .request(Method::GET, &format!("/api/v1/items/{}", item.id), None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["current_stock"], 10);
    assert_eq!(body["data"]["version"], 0);
}

#[tokio::test]
async fn unknown_items_map_to_not_found() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::GET,
            "/api/v1/items/00000000-0000-0000-0000-000000000000",
            None,
        )
        .await;
    assert_eq!(response.status(), 404);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Not Found");
    assert!(body["message"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn bad_adjustments_and_bad_filters_are_rejected_up_front() {
    let app = TestApp::new().await;
    let item = app.seed_item("power cord", 5).await;

    // Overdraw through the adjust endpoint
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/items/{}/adjust", item.id),
            Some(json!({
                "mode": "subtract",
                "quantity": 6,
                "operator": "auditor"
            })),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Bad Request");

    // Movement filter that names no known direction
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/items/{}/movements?kind=transfer", item.id),
            None,
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn amendments_over_http_append_and_conflict_on_repeat() {
    let app = TestApp::new().await;
    let item = app.seed_item("SFP cage", 7).await;

    let response = app
        .request(Method::GET, &format!("/api/v1/items/{}/audit", item.id), None)
        .await;
    let body = response_json(response).await;
    let entry_id = body["data"][0]["id"].as_i64().expect("entry id");

    let amend_payload = json!({
        "modified_by": "supervisor",
        "modification_reason": "wrong shelf noted",
        "notes": "actually stored on shelf B2"
    });
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/audit/{entry_id}/amend"),
            Some(amend_payload.clone()),
        )
        .await;
    assert_eq!(response.status(), 201);
    let body = response_json(response).await;
    assert_eq!(body["data"]["original_log_id"], entry_id);
    assert_eq!(body["data"]["notes"], "actually stored on shelf B2");

    // The chain now reads original then correction
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/audit/{entry_id}/chain"),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    let chain = body["data"].as_array().unwrap();
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0]["id"], entry_id);
    assert!(chain[0]["superseded"].as_bool().unwrap());

    // A superseded entry refuses further corrections
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/audit/{entry_id}/amend"),
            Some(amend_payload),
        )
        .await;
    assert_eq!(response.status(), 409);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Conflict");
}

#[tokio::test]
async fn health_endpoints_answer() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/health/live", None).await;
    assert_eq!(response.status(), 200);

    let response = app.request(Method::GET, "/health/ready", None).await;
    assert_eq!(response.status(), 200);
    let body = response_json(response).await;
    assert_eq!(body["status"], "ready");
}

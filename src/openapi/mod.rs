use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Stockroom API",
        version = "0.3.0",
        description = r#"
# Stockroom Consumable Ledger API

Bookkeeping for data-center consumables: cable ties, optics, screws, thermal
paste, and everything else that leaves the stockroom in someone's pocket.

## Features

- **Item Catalog**: Create, edit, import, and remove consumable items
- **Stock Ledger**: Receive and issue stock with optimistic concurrency control
- **Adjustments**: Correct balances after a physical count
- **Movement History**: Append-only record of every receive and issue
- **Audit Trail**: Every operation is recorded; manual entries can be amended
  through append-only correction chains

## Concurrency

Stock mutations use optimistic versioning. When two writers race, one commits
and the other retries against the fresh balance; callers see `409 Conflict`
only when retries are exhausted or the balance cannot cover an issue.

## Error Handling

Errors use a consistent JSON shape with appropriate HTTP status codes:

```json
{
  "error": "Conflict",
  "message": "insufficient stock for item ... requested 200, available 150",
  "request_id": "req-abc123",
  "timestamp": "2025-03-01T00:00:00Z"
}
```

## Pagination

List endpoints accept `page`/`limit` or `limit`/`offset` query parameters.
Page sizes are capped by the server.
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "items", description = "Item catalog endpoints"),
        (name = "stock", description = "Stock ledger endpoints"),
        (name = "audit", description = "Audit trail endpoints")
    ),
    paths(
        // Items
        crate::handlers::items::create_item,
        crate::handlers::items::list_items,
        crate::handlers::items::list_low_stock,
        crate::handlers::items::import_items,
        crate::handlers::items::get_item,
        crate::handlers::items::update_item,
        crate::handlers::items::delete_item,

        // Stock ledger
        crate::handlers::stock::receive_stock,
        crate::handlers::stock::issue_stock,
        crate::handlers::stock::adjust_stock,
        crate::handlers::stock::list_item_movements,

        // Audit trail
        crate::handlers::audit::list_item_audit_trail,
        crate::handlers::audit::get_audit_entry,
        crate::handlers::audit::get_amendment_chain,
        crate::handlers::audit::amend_audit_entry,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,

            // Item types
            crate::handlers::items::ItemResponse,
            crate::handlers::items::CreateItemRequest,
            crate::handlers::items::UpdateItemRequest,
            crate::handlers::items::ImportItemRow,
            crate::handlers::items::ImportItemsRequest,
            crate::handlers::items::DeleteItemResponse,

            // Stock types
            crate::handlers::stock::MovementResponse,
            crate::handlers::stock::ReceiveStockRequest,
            crate::handlers::stock::IssueStockRequest,
            crate::handlers::stock::AdjustStockRequest,
            crate::handlers::stock::StockMutationResponse,
            crate::handlers::stock::AdjustmentResponse,
            crate::services::AdjustmentMode,

            // Audit types
            crate::handlers::audit::AuditEntryResponse,
            crate::handlers::audit::AmendEntryRequest,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

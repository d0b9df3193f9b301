use crate::entities::consumable_item;
use crate::errors::ServiceError;
use crate::services::{
    CreateItemCommand, ImportItemsCommand, ItemCatalogService, ItemDraft, UpdateItemCommand,
};
use crate::{ApiResponse, ApiResult, PaginatedResponse};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// Trait for item handler state that provides access to the catalog service
pub trait ItemsHandlerState: Clone + Send + Sync + 'static {
    fn item_catalog(&self) -> &ItemCatalogService;
    /// (default page size, maximum page size) for list endpoints.
    fn page_limits(&self) -> (u64, u64);
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ItemResponse {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub current_stock: i32,
    pub min_stock: i32,
    pub max_stock: i32,
    pub version: i32,
    pub low_stock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<consumable_item::Model> for ItemResponse {
    fn from(item: consumable_item::Model) -> Self {
        let low_stock = item.is_low_stock();
        Self {
            id: item.id,
            name: item.name,
            category: item.category,
            unit: item.unit,
            current_stock: item.current_stock,
            min_stock: item.min_stock,
            max_stock: item.max_stock,
            version: item.version,
            low_stock,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateItemRequest {
    pub name: String,
    pub category: String,
    pub unit: String,
    #[serde(default)]
    pub initial_stock: i32,
    #[serde(default)]
    pub min_stock: i32,
    #[serde(default)]
    pub max_stock: i32,
    pub operator: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub min_stock: Option<i32>,
    pub max_stock: Option<i32>,
    pub operator: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ImportItemRow {
    pub name: String,
    pub category: String,
    pub unit: String,
    #[serde(default)]
    pub initial_stock: i32,
    #[serde(default)]
    pub min_stock: i32,
    #[serde(default)]
    pub max_stock: i32,
}

impl From<ImportItemRow> for ItemDraft {
    fn from(row: ImportItemRow) -> Self {
        ItemDraft {
            name: row.name,
            category: row.category,
            unit: row.unit,
            initial_stock: row.initial_stock,
            min_stock: row.min_stock,
            max_stock: row.max_stock,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ImportItemsRequest {
    pub items: Vec<ImportItemRow>,
    pub operator: String,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteItemResponse {
    pub item_id: Uuid,
    pub movements_removed: u64,
    pub audit_entries_removed: u64,
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct ItemListQuery {
    /// 1-based page number
    pub page: Option<u64>,
    /// Page size, capped by the server
    pub limit: Option<u64>,
    /// Restrict the listing to one category
    pub category: Option<String>,
    /// Substring match on the item name
    pub search: Option<String>,
}

/// Create the items router
pub fn items_router<S>() -> Router<S>
where
    S: ItemsHandlerState,
{
    Router::new()
        .route("/", post(create_item::<S>).get(list_items::<S>))
        .route("/low-stock", get(list_low_stock::<S>))
        .route("/import", post(import_items::<S>))
        .route(
            "/:id",
            get(get_item::<S>)
                .put(update_item::<S>)
                .delete(delete_item::<S>),
        )
}

/// Create a consumable item with its opening balance
#[utoipa::path(
    post,
    path = "/api/v1/items",
    request_body = CreateItemRequest,
    responses(
        (status = 201, description = "Item created", body = ItemResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn create_item<S>(
    State(state): State<S>,
    Json(payload): Json<CreateItemRequest>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: ItemsHandlerState,
{
    let command = CreateItemCommand {
        item: ItemDraft {
            name: payload.name,
            category: payload.category,
            unit: payload.unit,
            initial_stock: payload.initial_stock,
            min_stock: payload.min_stock,
            max_stock: payload.max_stock,
        },
        operator: payload.operator,
        reason: payload.reason,
        notes: payload.notes,
    };
    let item = state.item_catalog().create_item(command).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(ItemResponse::from(item))),
    ))
}

/// List catalog items one page at a time
#[utoipa::path(
    get,
    path = "/api/v1/items",
    params(ItemListQuery),
    responses(
        (status = 200, description = "Item page returned", body = ItemResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn list_items<S>(
    State(state): State<S>,
    Query(query): Query<ItemListQuery>,
) -> ApiResult<PaginatedResponse<ItemResponse>>
where
    S: ItemsHandlerState,
{
    let (default_limit, max_limit) = state.page_limits();
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(default_limit).clamp(1, max_limit);

    let listing = state
        .item_catalog()
        .list_items(page, limit, query.category.as_deref(), query.search.as_deref())
        .await?;

    let total_pages = if listing.total == 0 {
        0
    } else {
        (listing.total + limit - 1) / limit
    };
    Ok(Json(ApiResponse::success(PaginatedResponse {
        items: listing
            .items
            .into_iter()
            .map(ItemResponse::from)
            .collect(),
        total: listing.total,
        page: listing.page,
        limit: listing.per_page,
        total_pages,
    })))
}

/// Items at or below their minimum stock level
#[utoipa::path(
    get,
    path = "/api/v1/items/low-stock",
    responses(
        (status = 200, description = "Low stock items returned", body = ItemResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn list_low_stock<S>(State(state): State<S>) -> ApiResult<Vec<ItemResponse>>
where
    S: ItemsHandlerState,
{
    let items = state.item_catalog().list_low_stock().await?;
    Ok(Json(ApiResponse::success(
        items.into_iter().map(ItemResponse::from).collect(),
    )))
}

/// Bulk-create items from an export; all rows land or none do
#[utoipa::path(
    post,
    path = "/api/v1/items/import",
    request_body = ImportItemsRequest,
    responses(
        (status = 201, description = "Items imported", body = ItemResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn import_items<S>(
    State(state): State<S>,
    Json(payload): Json<ImportItemsRequest>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: ItemsHandlerState,
{
    let command = ImportItemsCommand {
        items: payload.items.into_iter().map(ItemDraft::from).collect(),
        operator: payload.operator,
        notes: payload.notes,
    };
    let items = state.item_catalog().import_items(command).await?;

    let imported: Vec<ItemResponse> = items.into_iter().map(ItemResponse::from).collect();
    Ok((StatusCode::CREATED, Json(ApiResponse::success(imported))))
}

/// Fetch a single item
#[utoipa::path(
    get,
    path = "/api/v1/items/{id}",
    params(("id" = Uuid, Path, description = "Item id")),
    responses(
        (status = 200, description = "Item returned", body = ItemResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn get_item<S>(State(state): State<S>, Path(id): Path<Uuid>) -> ApiResult<ItemResponse>
where
    S: ItemsHandlerState,
{
    let item = state.item_catalog().get_item(id).await?;
    Ok(Json(ApiResponse::success(ItemResponse::from(item))))
}

/// Edit catalog fields; balances only move through the stock endpoints
#[utoipa::path(
    put,
    path = "/api/v1/items/{id}",
    params(("id" = Uuid, Path, description = "Item id")),
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Item updated", body = ItemResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Item changed concurrently", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn update_item<S>(
    State(state): State<S>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateItemRequest>,
) -> ApiResult<ItemResponse>
where
    S: ItemsHandlerState,
{
    let command = UpdateItemCommand {
        name: payload.name,
        category: payload.category,
        unit: payload.unit,
        min_stock: payload.min_stock,
        max_stock: payload.max_stock,
        operator: payload.operator,
        reason: payload.reason,
        notes: payload.notes,
    };
    let item = state.item_catalog().update_item(id, command).await?;
    Ok(Json(ApiResponse::success(ItemResponse::from(item))))
}

/// Remove an item together with its movement and audit history
#[utoipa::path(
    delete,
    path = "/api/v1/items/{id}",
    params(("id" = Uuid, Path, description = "Item id")),
    responses(
        (status = 200, description = "Item deleted", body = DeleteItemResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "items"
)]
pub async fn delete_item<S>(
    State(state): State<S>,
    Path(id): Path<Uuid>,
) -> ApiResult<DeleteItemResponse>
where
    S: ItemsHandlerState,
{
    let summary = state.item_catalog().delete_item(id).await?;
    Ok(Json(ApiResponse::success(DeleteItemResponse {
        item_id: summary.item_id,
        movements_removed: summary.movements_removed,
        audit_entries_removed: summary.audit_entries_removed,
    })))
}

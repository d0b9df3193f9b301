use super::items::ItemResponse;
use crate::entities::stock_movement::{self, MovementKind};
use crate::errors::ServiceError;
use crate::queries::{GetItemMovementsQuery, Query as StoreQuery};
use crate::services::{
    AdjustmentMode, ApplyAdjustmentCommand, ApplyMovementCommand, StockLedgerService,
};
use crate::{ApiResponse, ApiResult};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// Trait for stock handler state providing the ledger service and read access
pub trait StockHandlerState: Clone + Send + Sync + 'static {
    fn stock_ledger(&self) -> &StockLedgerService;
    fn db(&self) -> &DatabaseConnection;
    /// (default page size, maximum page size) for list endpoints.
    fn page_limits(&self) -> (u64, u64);
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MovementResponse {
    pub id: Uuid,
    pub item_id: Uuid,
    pub kind: String,
    pub quantity: i32,
    pub previous_stock: i32,
    pub current_stock: i32,
    pub operator: String,
    pub reason: Option<String>,
    pub recipient: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<stock_movement::Model> for MovementResponse {
    fn from(movement: stock_movement::Model) -> Self {
        Self {
            id: movement.id,
            item_id: movement.item_id,
            kind: movement.kind,
            quantity: movement.quantity,
            previous_stock: movement.previous_stock,
            current_stock: movement.current_stock,
            operator: movement.operator,
            reason: movement.reason,
            recipient: movement.recipient,
            notes: movement.notes,
            created_at: movement.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ReceiveStockRequest {
    pub quantity: i32,
    pub operator: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct IssueStockRequest {
    pub quantity: i32,
    pub operator: String,
    pub recipient: Option<String>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdjustStockRequest {
    pub mode: AdjustmentMode,
    pub quantity: i32,
    pub operator: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

/// A committed receive or issue: the movement that was recorded and the
/// item balance after it.
#[derive(Debug, Serialize, ToSchema)]
pub struct StockMutationResponse {
    pub item: ItemResponse,
    pub movement: MovementResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdjustmentResponse {
    pub item: ItemResponse,
    pub previous_stock: i32,
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct MovementListQuery {
    /// Filter on "receive" or "issue"
    pub kind: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Stock routes, mounted under the items prefix
pub fn stock_router<S>() -> Router<S>
where
    S: StockHandlerState,
{
    Router::new()
        .route("/:id/receive", post(receive_stock::<S>))
        .route("/:id/issue", post(issue_stock::<S>))
        .route("/:id/adjust", post(adjust_stock::<S>))
        .route("/:id/movements", get(list_item_movements::<S>))
}

/// Add received stock to an item's balance
#[utoipa::path(
    post,
    path = "/api/v1/items/{id}/receive",
    params(("id" = Uuid, Path, description = "Item id")),
    request_body = ReceiveStockRequest,
    responses(
        (status = 200, description = "Stock received", body = StockMutationResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent mutations exhausted retries", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn receive_stock<S>(
    State(state): State<S>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReceiveStockRequest>,
) -> ApiResult<StockMutationResponse>
where
    S: StockHandlerState,
{
    let command = ApplyMovementCommand {
        item_id: id,
        kind: MovementKind::Receive,
        quantity: payload.quantity,
        operator: payload.operator,
        reason: payload.reason,
        recipient: None,
        notes: payload.notes,
    };
    let outcome = state.stock_ledger().apply_movement(command).await?;
    Ok(Json(ApiResponse::success(StockMutationResponse {
        item: ItemResponse::from(outcome.item),
        movement: MovementResponse::from(outcome.movement),
    })))
}

/// Issue stock from an item's balance; fails when not enough is on hand
#[utoipa::path(
    post,
    path = "/api/v1/items/{id}/issue",
    params(("id" = Uuid, Path, description = "Item id")),
    request_body = IssueStockRequest,
    responses(
        (status = 200, description = "Stock issued", body = StockMutationResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Insufficient stock or retries exhausted", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn issue_stock<S>(
    State(state): State<S>,
    Path(id): Path<Uuid>,
    Json(payload): Json<IssueStockRequest>,
) -> ApiResult<StockMutationResponse>
where
    S: StockHandlerState,
{
    let command = ApplyMovementCommand {
        item_id: id,
        kind: MovementKind::Issue,
        quantity: payload.quantity,
        operator: payload.operator,
        reason: payload.reason,
        recipient: payload.recipient,
        notes: payload.notes,
    };
    let outcome = state.stock_ledger().apply_movement(command).await?;
    Ok(Json(ApiResponse::success(StockMutationResponse {
        item: ItemResponse::from(outcome.item),
        movement: MovementResponse::from(outcome.movement),
    })))
}

/// Correct an item's balance without recording a movement
#[utoipa::path(
    post,
    path = "/api/v1/items/{id}/adjust",
    params(("id" = Uuid, Path, description = "Item id")),
    request_body = AdjustStockRequest,
    responses(
        (status = 200, description = "Balance adjusted", body = AdjustmentResponse),
        (status = 400, description = "Adjustment would leave a negative balance", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent mutations exhausted retries", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn adjust_stock<S>(
    State(state): State<S>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdjustStockRequest>,
) -> ApiResult<AdjustmentResponse>
where
    S: StockHandlerState,
{
    let command = ApplyAdjustmentCommand {
        item_id: id,
        mode: payload.mode,
        quantity: payload.quantity,
        operator: payload.operator,
        reason: payload.reason,
        notes: payload.notes,
    };
    let outcome = state.stock_ledger().apply_adjustment(command).await?;
    Ok(Json(ApiResponse::success(AdjustmentResponse {
        item: ItemResponse::from(outcome.item),
        previous_stock: outcome.previous_stock,
    })))
}

/// Movements recorded against an item, newest first
#[utoipa::path(
    get,
    path = "/api/v1/items/{id}/movements",
    params(("id" = Uuid, Path, description = "Item id"), MovementListQuery),
    responses(
        (status = 200, description = "Movements returned", body = MovementResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn list_item_movements<S>(
    State(state): State<S>,
    Path(id): Path<Uuid>,
    Query(query): Query<MovementListQuery>,
) -> ApiResult<Vec<MovementResponse>>
where
    S: StockHandlerState,
{
    let kind = match query.kind.as_deref() {
        Some(raw) => Some(MovementKind::from_str(raw).ok_or_else(|| {
            ServiceError::Validation(format!("unrecognized movement kind '{raw}'"))
        })?),
        None => None,
    };
    let (default_limit, max_limit) = state.page_limits();
    let limit = query.limit.unwrap_or(default_limit).clamp(1, max_limit);

    let movements = GetItemMovementsQuery {
        item_id: id,
        kind,
        start_date: query.start_date,
        end_date: query.end_date,
        limit,
        offset: query.offset.unwrap_or(0),
    }
    .execute(state.db())
    .await?;

    Ok(Json(ApiResponse::success(
        movements.into_iter().map(MovementResponse::from).collect(),
    )))
}

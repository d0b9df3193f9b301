use crate::entities::audit_log::{self, OperationKind};
use crate::errors::ServiceError;
use crate::queries::{
    GetAmendmentChainQuery, GetAuditEntryQuery, GetItemAuditTrailQuery, Query as StoreQuery,
};
use crate::services::{AmendEntryCommand, AuditTrailService};
use crate::{ApiResponse, ApiResult};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

// Trait for audit handler state providing the trail service and read access
pub trait AuditHandlerState: Clone + Send + Sync + 'static {
    fn audit_trail(&self) -> &AuditTrailService;
    fn db(&self) -> &DatabaseConnection;
    /// (default page size, maximum page size) for list endpoints.
    fn page_limits(&self) -> (u64, u64);
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuditEntryResponse {
    pub id: i64,
    pub item_id: Uuid,
    pub item_name: String,
    pub operation_kind: String,
    pub signed_quantity: i32,
    pub previous_stock: i32,
    pub current_stock: i32,
    pub operator: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub is_editable: bool,
    pub superseded: bool,
    pub amendable: bool,
    pub original_log_id: Option<i64>,
    pub modified_by: Option<String>,
    pub modified_at: Option<DateTime<Utc>>,
    pub modification_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<audit_log::Model> for AuditEntryResponse {
    fn from(entry: audit_log::Model) -> Self {
        let amendable = entry.is_amendable();
        Self {
            id: entry.id,
            item_id: entry.item_id,
            item_name: entry.item_name,
            operation_kind: entry.operation_kind,
            signed_quantity: entry.signed_quantity,
            previous_stock: entry.previous_stock,
            current_stock: entry.current_stock,
            operator: entry.operator,
            reason: entry.reason,
            notes: entry.notes,
            is_editable: entry.is_editable,
            superseded: entry.superseded,
            amendable,
            original_log_id: entry.original_log_id,
            modified_by: entry.modified_by,
            modified_at: entry.modified_at,
            modification_reason: entry.modification_reason,
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AmendEntryRequest {
    pub modified_by: String,
    pub modification_reason: String,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct AuditTrailQuery {
    /// Filter on an operation kind such as "issue" or "create"
    pub kind: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Audit trail listing for one item, mounted under the items prefix
pub fn item_audit_router<S>() -> Router<S>
where
    S: AuditHandlerState,
{
    Router::new().route("/:id/audit", get(list_item_audit_trail::<S>))
}

/// Entry-level audit routes
pub fn audit_router<S>() -> Router<S>
where
    S: AuditHandlerState,
{
    Router::new()
        .route("/:entry_id", get(get_audit_entry::<S>))
        .route("/:entry_id/chain", get(get_amendment_chain::<S>))
        .route("/:entry_id/amend", post(amend_audit_entry::<S>))
}

/// Audit entries recorded against an item, newest first
#[utoipa::path(
    get,
    path = "/api/v1/items/{id}/audit",
    params(("id" = Uuid, Path, description = "Item id"), AuditTrailQuery),
    responses(
        (status = 200, description = "Audit entries returned", body = AuditEntryResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "audit"
)]
pub async fn list_item_audit_trail<S>(
    State(state): State<S>,
    Path(id): Path<Uuid>,
    Query(query): Query<AuditTrailQuery>,
) -> ApiResult<Vec<AuditEntryResponse>>
where
    S: AuditHandlerState,
{
    let operation_kind = match query.kind.as_deref() {
        Some(raw) => Some(OperationKind::from_str(raw).ok_or_else(|| {
            ServiceError::Validation(format!("unrecognized operation kind '{raw}'"))
        })?),
        None => None,
    };
    let (default_limit, max_limit) = state.page_limits();
    let limit = query.limit.unwrap_or(default_limit).clamp(1, max_limit);

    let entries = GetItemAuditTrailQuery {
        item_id: id,
        operation_kind,
        start_date: query.start_date,
        end_date: query.end_date,
        limit,
        offset: query.offset.unwrap_or(0),
    }
    .execute(state.db())
    .await?;

    Ok(Json(ApiResponse::success(
        entries.into_iter().map(AuditEntryResponse::from).collect(),
    )))
}

/// Fetch a single audit entry
#[utoipa::path(
    get,
    path = "/api/v1/audit/{entry_id}",
    params(("entry_id" = i64, Path, description = "Audit entry id")),
    responses(
        (status = 200, description = "Audit entry returned", body = AuditEntryResponse),
        (status = 404, description = "Entry not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "audit"
)]
pub async fn get_audit_entry<S>(
    State(state): State<S>,
    Path(entry_id): Path<i64>,
) -> ApiResult<AuditEntryResponse>
where
    S: AuditHandlerState,
{
    let entry = GetAuditEntryQuery { entry_id }.execute(state.db()).await?;
    Ok(Json(ApiResponse::success(AuditEntryResponse::from(entry))))
}

/// The full amendment chain an entry belongs to, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/audit/{entry_id}/chain",
    params(("entry_id" = i64, Path, description = "Audit entry id")),
    responses(
        (status = 200, description = "Amendment chain returned", body = AuditEntryResponse),
        (status = 404, description = "Entry not found", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "audit"
)]
pub async fn get_amendment_chain<S>(
    State(state): State<S>,
    Path(entry_id): Path<i64>,
) -> ApiResult<Vec<AuditEntryResponse>>
where
    S: AuditHandlerState,
{
    let chain = GetAmendmentChainQuery { entry_id }
        .execute(state.db())
        .await?;
    Ok(Json(ApiResponse::success(
        chain.into_iter().map(AuditEntryResponse::from).collect(),
    )))
}

/// Correct the descriptive fields of an editable audit entry
#[utoipa::path(
    post,
    path = "/api/v1/audit/{entry_id}/amend",
    params(("entry_id" = i64, Path, description = "Audit entry id")),
    request_body = AmendEntryRequest,
    responses(
        (status = 201, description = "Amendment recorded", body = AuditEntryResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 404, description = "Entry not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Entry is sealed or already superseded", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse)
    ),
    tag = "audit"
)]
pub async fn amend_audit_entry<S>(
    State(state): State<S>,
    Path(entry_id): Path<i64>,
    Json(payload): Json<AmendEntryRequest>,
) -> Result<impl IntoResponse, ServiceError>
where
    S: AuditHandlerState,
{
    let command = AmendEntryCommand {
        modified_by: payload.modified_by,
        modification_reason: payload.modification_reason,
        reason: payload.reason,
        notes: payload.notes,
    };
    let amendment = state.audit_trail().amend_entry(entry_id, command).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(AuditEntryResponse::from(amendment))),
    ))
}

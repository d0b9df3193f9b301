use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

fn current_request_id() -> Option<String> {
    crate::request_id::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Standard error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Unprocessable Entity",
    "message": "Insufficient stock on item 550e8400-e29b-41d4-a716-446655440000: requested 200, available 150",
    "details": null,
    "request_id": "req-abc123xyz",
    "timestamp": "2025-11-03T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    #[schema(example = "Not Found")]
    pub error: String,
    /// Human-readable error description
    #[schema(example = "Consumable item 550e8400-e29b-41d4-a716-446655440000 not found")]
    pub message: String,
    /// Additional error details (validation errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "Field 'quantity' must be at least 1")]
    pub details: Option<String>,
    /// Unique request identifier for support and debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(example = "req-abc123xyz")]
    pub request_id: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    #[schema(example = "2025-11-03T10:30:00.000Z")]
    pub timestamp: String,
}

/// Error taxonomy for the stock ledger and its surrounding surfaces.
///
/// Business rejections carry the identifiers and quantities the caller
/// needs to render an actionable message; storage faults keep their
/// source but are redacted from HTTP bodies.
#[derive(Debug, thiserror::Error, Serialize)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(
        #[from]
        #[serde(skip)]
        sea_orm::error::DbErr,
    ),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Insufficient stock on item {item_id}: requested {requested}, available {available}")]
    InsufficientStock {
        item_id: Uuid,
        requested: i32,
        available: i32,
    },

    #[error("Invalid adjustment on item {item_id}: cannot {mode} {quantity} when balance is {current_stock}")]
    InvalidAdjustment {
        item_id: Uuid,
        mode: &'static str,
        quantity: i32,
        current_stock: i32,
    },

    #[error("Concurrent update on item {item_id}: gave up after {attempts} attempts")]
    ConcurrencyConflict { item_id: Uuid, attempts: u32 },

    #[error("Audit entry {entry_id} cannot be amended: {reason}")]
    NotAmendable { entry_id: i64, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Stock mutation on item {item_id} timed out after {elapsed_ms}ms")]
    OperationTimeout { item_id: Uuid, elapsed_ms: u64 },

    #[error("Event error: {0}")]
    EventPublish(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

pub trait IntoDbErr {
    fn into_db_err(self) -> DbErr;
}

impl IntoDbErr for DbErr {
    fn into_db_err(self) -> DbErr {
        self
    }
}

impl IntoDbErr for String {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self)
    }
}

impl IntoDbErr for &str {
    fn into_db_err(self) -> DbErr {
        DbErr::Custom(self.to_string())
    }
}

impl ServiceError {
    /// Generic constructor that normalizes any supported database error input.
    pub fn db_error<E: IntoDbErr>(error: E) -> Self {
        ServiceError::Database(error.into_db_err())
    }

    pub fn item_not_found(id: Uuid) -> Self {
        ServiceError::NotFound {
            entity: "Consumable item",
            id: id.to_string(),
        }
    }

    pub fn audit_entry_not_found(id: i64) -> Self {
        ServiceError::NotFound {
            entity: "Audit entry",
            id: id.to_string(),
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InsufficientStock { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidAdjustment { .. } | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::ConcurrencyConflict { .. } | Self::NotAmendable { .. } => StatusCode::CONFLICT,
            Self::OperationTimeout { .. } => StatusCode::REQUEST_TIMEOUT,
            Self::EventPublish(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::Database(_) => "Database error".to_string(),
            Self::EventPublish(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::ConcurrencyConflict { item_id, .. } => format!(
                "Item {} was updated concurrently; please retry the operation",
                item_id
            ),
            // Business rejections carry their full message to the caller
            _ => self.to_string(),
        }
    }

    /// Whether the caller can expect a later retry of the same request to
    /// succeed without changing it.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConcurrencyConflict { .. } | Self::OperationTimeout { .. }
        )
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_message = self.response_message();

        let request_id = current_request_id();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: error_message,
            details: None,
            request_id,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::to_bytes, http::StatusCode};

    #[tokio::test]
    async fn error_response_includes_request_id() {
        let response = crate::request_id::scope_request_id(
            crate::request_id::RequestId::new("req-123"),
            async { ServiceError::item_not_found(Uuid::new_v4()).into_response() },
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload.request_id.as_deref(), Some("req-123"));
    }

    #[test]
    fn status_code_mapping() {
        let item_id = Uuid::new_v4();
        assert_eq!(
            ServiceError::item_not_found(item_id).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::InsufficientStock {
                item_id,
                requested: 200,
                available: 150
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::InvalidAdjustment {
                item_id,
                mode: "subtract",
                quantity: 60,
                current_stock: 50
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::ConcurrencyConflict {
                item_id,
                attempts: 3
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::NotAmendable {
                entry_id: 7,
                reason: "entry was generated by the ledger".into()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::Validation("quantity must be at least 1".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::OperationTimeout {
                item_id,
                elapsed_ms: 10_000
            }
            .status_code(),
            StatusCode::REQUEST_TIMEOUT
        );
        assert_eq!(
            ServiceError::db_error("connection reset").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn response_message_hides_storage_details() {
        assert_eq!(
            ServiceError::db_error("FATAL: password authentication failed").response_message(),
            "Database error"
        );
        assert_eq!(
            ServiceError::EventPublish("channel closed".into()).response_message(),
            "Internal server error"
        );

        // Business rejections keep their full, actionable message
        let item_id = Uuid::new_v4();
        let msg = ServiceError::InsufficientStock {
            item_id,
            requested: 200,
            available: 150,
        }
        .response_message();
        assert!(msg.contains("requested 200"));
        assert!(msg.contains("available 150"));
        assert!(msg.contains(&item_id.to_string()));
    }

    #[test]
    fn conflict_is_the_only_retry_signal_besides_timeout() {
        let item_id = Uuid::new_v4();
        assert!(ServiceError::ConcurrencyConflict {
            item_id,
            attempts: 3
        }
        .is_retryable());
        assert!(ServiceError::OperationTimeout {
            item_id,
            elapsed_ms: 5
        }
        .is_retryable());
        assert!(!ServiceError::InsufficientStock {
            item_id,
            requested: 1,
            available: 0
        }
        .is_retryable());
        assert!(!ServiceError::item_not_found(item_id).is_retryable());
    }
}

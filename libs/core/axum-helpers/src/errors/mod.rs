pub mod codes;
pub mod handlers;
pub mod responses;

pub use codes::ErrorCode;

use std::time::Duration;

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{HeaderValue, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
};
use database::idempotency::IdempotencyError;
use database::repository::RepositoryError;
use sea_orm::DbErr;
use serde::Serialize;
use thiserror::Error;
use upstream::UpstreamError;
use utoipa::ToSchema;
use uuid::Error as UuidError;
use validator::ValidationErrors;

/// Standard error response structure.
///
/// Every error response carries:
/// - `code`: Integer error code for logging/monitoring (e.g., 1012)
/// - `error`: Machine-readable error identifier (e.g., "VERSION_CONFLICT")
/// - `message`: Human-readable error message
/// - `details`: Optional additional error details (e.g., validation errors)
///
/// # JSON Example
///
/// ```json
/// {
///   "code": 1012,
///   "error": "VERSION_CONFLICT",
///   "message": "Version conflict: expected version 1"
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Integer error code for logging and monitoring
    pub code: i32,
    /// Machine-readable error identifier for programmatic handling
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Optional structured error details (e.g., validation field errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            error: code.as_str().to_string(),
            message: message.into(),
            details: None,
        }
    }
}

/// Application error type that can be converted to HTTP responses.
///
/// Repository, upstream and idempotency errors convert with `?`; each kind
/// maps to exactly one status without inspecting its message.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    #[error("JSON parsing error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("JSON extraction error: {0}")]
    JsonExtractorRejection(#[from] JsonRejection),

    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationErrors),

    #[error("UUID error: {0}")]
    UuidError(#[from] UuidError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Idempotency(#[from] IdempotencyError),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unprocessable Entity: {0}")]
    UnprocessableEntity(String),

    #[error("Internal Server Error: {0}")]
    InternalServerError(String),

    #[error("Service Unavailable: {0}")]
    ServiceUnavailable(String),
}

type ErrorParts = (StatusCode, String, Option<serde_json::Value>, ErrorCode);

impl AppError {
    /// Status code this error renders with.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::SerdeJson(_) | AppError::Database(_) | AppError::InternalServerError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::JsonExtractorRejection(e) => e.status(),
            AppError::ValidationError(_) | AppError::UuidError(_) | AppError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Repository(e) => repository_status(e),
            AppError::Upstream(e) => upstream_status(e),
            AppError::Idempotency(e) => match e {
                IdempotencyError::Duplicate { .. } => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::UnprocessableEntity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn into_parts(self) -> ErrorParts {
        let status = self.status();
        match self {
            AppError::SerdeJson(e) => {
                tracing::error!(
                    error_code = ErrorCode::SerdeJsonError.code(),
                    "JSON parsing error: {:?}",
                    e
                );
                (
                    status,
                    ErrorCode::SerdeJsonError.default_message().to_string(),
                    None,
                    ErrorCode::SerdeJsonError,
                )
            }
            AppError::Database(e) => {
                tracing::error!(
                    error_code = ErrorCode::DatabaseError.code(),
                    "Database error: {:?}",
                    e
                );
                (
                    status,
                    ErrorCode::DatabaseError.default_message().to_string(),
                    None,
                    ErrorCode::DatabaseError,
                )
            }
            AppError::JsonExtractorRejection(e) => {
                tracing::warn!(
                    error_code = ErrorCode::JsonExtraction.code(),
                    "JSON extraction error: {:?}",
                    e
                );
                (status, e.body_text(), None, ErrorCode::JsonExtraction)
            }
            AppError::ValidationError(e) => {
                tracing::info!(
                    error_code = ErrorCode::ValidationError.code(),
                    "Validation error: {:?}",
                    e
                );
                (
                    status,
                    ErrorCode::ValidationError.default_message().to_string(),
                    serde_json::to_value(&e).ok(),
                    ErrorCode::ValidationError,
                )
            }
            AppError::UuidError(e) => {
                tracing::warn!(
                    error_code = ErrorCode::InvalidUuid.code(),
                    "UUID error: {:?}",
                    e
                );
                (
                    status,
                    ErrorCode::InvalidUuid.default_message().to_string(),
                    None,
                    ErrorCode::InvalidUuid,
                )
            }
            AppError::Repository(e) => map_repository_error(status, e),
            AppError::Upstream(e) => map_upstream_error(status, e),
            AppError::Idempotency(e) => map_idempotency_error(status, e),
            AppError::BadRequest(msg) => {
                tracing::info!("Bad request: {}", msg);
                (status, msg, None, ErrorCode::ValidationError)
            }
            AppError::Unauthorized(msg) => {
                tracing::info!("Unauthorized: {}", msg);
                (status, msg, None, ErrorCode::Unauthorized)
            }
            AppError::Forbidden(msg) => {
                tracing::info!("Forbidden: {}", msg);
                (status, msg, None, ErrorCode::Forbidden)
            }
            AppError::NotFound(msg) => {
                tracing::info!(error_code = ErrorCode::NotFound.code(), "Not found: {}", msg);
                (status, msg, None, ErrorCode::NotFound)
            }
            AppError::Conflict(msg) => {
                tracing::info!("Conflict: {}", msg);
                (status, msg, None, ErrorCode::Conflict)
            }
            AppError::UnprocessableEntity(msg) => {
                tracing::info!("Unprocessable entity: {}", msg);
                (status, msg, None, ErrorCode::UnprocessableEntity)
            }
            AppError::InternalServerError(msg) => {
                tracing::error!(
                    error_code = ErrorCode::InternalError.code(),
                    "Internal server error: {}",
                    msg
                );
                (
                    status,
                    ErrorCode::InternalError.default_message().to_string(),
                    None,
                    ErrorCode::InternalError,
                )
            }
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (status, msg, None, ErrorCode::ServiceUnavailable)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retry_after = match &self {
            AppError::Upstream(e) => e.retry_after(),
            _ => None,
        };
        let (status, message, details, code) = self.into_parts();

        let body = Json(ErrorResponse {
            code: code.code(),
            error: code.as_str().to_string(),
            message,
            details,
        });

        let mut response = (status, body).into_response();
        if let Some(delay) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, retry_after_value(delay));
        }
        response
    }
}

/// Whole seconds, rounded up, never below one.
fn retry_after_value(delay: Duration) -> HeaderValue {
    let secs = delay.as_secs() + u64::from(delay.subsec_nanos() > 0);
    HeaderValue::from(secs.max(1))
}

fn repository_status(error: &RepositoryError) -> StatusCode {
    match error {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Duplicate(_) | RepositoryError::Concurrency { .. } => StatusCode::CONFLICT,
        RepositoryError::ForeignKeyViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RepositoryError::InvalidCursor(_) | RepositoryError::InvalidFilter(_) => {
            StatusCode::BAD_REQUEST
        }
        RepositoryError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn map_repository_error(status: StatusCode, error: RepositoryError) -> ErrorParts {
    let code = match &error {
        RepositoryError::NotFound => ErrorCode::NotFound,
        RepositoryError::Duplicate(_) => ErrorCode::Conflict,
        RepositoryError::Concurrency { .. } => ErrorCode::VersionConflict,
        RepositoryError::ForeignKeyViolation(_) => ErrorCode::ForeignKeyViolation,
        RepositoryError::InvalidCursor(_) => ErrorCode::InvalidCursor,
        RepositoryError::InvalidFilter(_) => ErrorCode::InvalidFilter,
        RepositoryError::Database(_) => ErrorCode::DatabaseError,
    };

    match &error {
        RepositoryError::Database(detail) => {
            tracing::error!(error_code = code.code(), "Repository error: {}", detail);
            (status, code.default_message().to_string(), None, code)
        }
        // Constraint names stay in the logs.
        RepositoryError::Duplicate(detail) | RepositoryError::ForeignKeyViolation(detail) => {
            tracing::info!(error_code = code.code(), "Integrity violation: {}", detail);
            (status, code.default_message().to_string(), None, code)
        }
        RepositoryError::Concurrency { expected } => {
            tracing::info!(error_code = code.code(), expected, "Stale version");
            (
                status,
                error.to_string(),
                Some(serde_json::json!({ "expected_version": expected })),
                code,
            )
        }
        _ => {
            tracing::info!(error_code = code.code(), "{}", error);
            (status, error.to_string(), None, code)
        }
    }
}

fn upstream_status(error: &UpstreamError) -> StatusCode {
    match error {
        UpstreamError::CircuitOpen { .. } | UpstreamError::Unavailable { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        UpstreamError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        UpstreamError::InvalidResponse { .. } => StatusCode::BAD_GATEWAY,
        UpstreamError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
    }
}

fn map_upstream_error(status: StatusCode, error: UpstreamError) -> ErrorParts {
    let code = match &error {
        UpstreamError::CircuitOpen { .. } => ErrorCode::CircuitOpen,
        UpstreamError::Timeout { .. } => ErrorCode::UpstreamTimeout,
        UpstreamError::Unavailable { .. } => ErrorCode::UpstreamUnavailable,
        UpstreamError::InvalidResponse { .. } => ErrorCode::UpstreamInvalidResponse,
        UpstreamError::RateLimited { .. } => ErrorCode::UpstreamRateLimited,
    };
    tracing::warn!(
        error_code = code.code(),
        service = error.service(),
        "Upstream error: {}",
        error
    );

    let details = serde_json::json!({ "service": error.service() });
    (status, code.default_message().to_string(), Some(details), code)
}

fn map_idempotency_error(status: StatusCode, error: IdempotencyError) -> ErrorParts {
    match error {
        IdempotencyError::Duplicate { key, .. } => {
            tracing::info!(
                error_code = ErrorCode::IdempotencyConflict.code(),
                key = %key,
                "Idempotency key already stored"
            );
            (
                status,
                ErrorCode::IdempotencyConflict.default_message().to_string(),
                None,
                ErrorCode::IdempotencyConflict,
            )
        }
        other => {
            tracing::error!(
                error_code = ErrorCode::IdempotencyStorage.code(),
                "Idempotency store error: {}",
                other
            );
            (
                status,
                ErrorCode::IdempotencyStorage.default_message().to_string(),
                None,
                ErrorCode::IdempotencyStorage,
            )
        }
    }
}

/// Helper function to create error responses.
///
/// ```rust,ignore
/// let response = error_response(
///     StatusCode::BAD_REQUEST,
///     "Invalid input".to_string(),
///     ErrorCode::ValidationError,
/// );
/// ```
pub fn error_response(status: StatusCode, message: String, error_code: ErrorCode) -> Response {
    (status, Json(ErrorResponse::new(error_code, message))).into_response()
}

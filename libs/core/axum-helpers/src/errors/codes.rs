//! Type-safe error codes for API responses.
//!
//! Each error code carries:
//! - String representation for client consumption (e.g., "VERSION_CONFLICT")
//! - Integer code for logging and monitoring (e.g., 1012)
//! - Default human-readable message
//!
//! # Example
//!
//! ```rust
//! use axum_helpers::errors::ErrorCode;
//!
//! let code = ErrorCode::VersionConflict;
//! assert_eq!(code.as_str(), "VERSION_CONFLICT");
//! assert_eq!(code.code(), 1012);
//! ```

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Standardized error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Client errors (1000-1999)
    /// Request validation failed
    ValidationError,

    /// Invalid UUID format in path or query parameter
    InvalidUuid,

    /// JSON extraction from request body failed
    JsonExtraction,

    /// Requested resource was not found
    NotFound,

    /// Tenant or user context is missing or malformed
    Unauthorized,

    /// Caller lacks the permission for this operation
    Forbidden,

    /// Resource already exists
    Conflict,

    /// Request payload is semantically incorrect
    UnprocessableEntity,

    /// Stale `version` on an optimistic update
    VersionConflict,

    /// Pagination cursor could not be decoded
    InvalidCursor,

    /// Filter document could not be parsed
    InvalidFilter,

    /// Referenced row does not exist
    ForeignKeyViolation,

    /// Malformed `Idempotency-Key` header
    InvalidIdempotencyKey,

    /// HTTP method not supported by the route
    MethodNotAllowed,

    // Server errors
    /// An unexpected internal server error occurred
    InternalError,

    /// Service is temporarily unavailable
    ServiceUnavailable,

    // Database errors (2000-2999)
    /// Database query or connection failed
    DatabaseError,

    // Upstream errors (6000-6999)
    /// Breaker for the upstream is open
    CircuitOpen,

    /// Upstream did not answer in time
    UpstreamTimeout,

    /// Upstream failed or could not be reached
    UpstreamUnavailable,

    /// Upstream answered with something unusable
    UpstreamInvalidResponse,

    /// Upstream is throttling requests
    UpstreamRateLimited,

    // Idempotency errors (7000-7999)
    /// Another request with this key is being stored
    IdempotencyConflict,

    /// Idempotency store failed
    IdempotencyStorage,

    // JSON errors (5000s)
    /// JSON serialization/deserialization error
    SerdeJsonError,
}

impl ErrorCode {
    /// SCREAMING_SNAKE_CASE identifier clients branch on.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::InvalidUuid => "INVALID_UUID",
            Self::JsonExtraction => "JSON_EXTRACTION",
            Self::NotFound => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::Conflict => "CONFLICT",
            Self::UnprocessableEntity => "UNPROCESSABLE_ENTITY",
            Self::VersionConflict => "VERSION_CONFLICT",
            Self::InvalidCursor => "INVALID_CURSOR",
            Self::InvalidFilter => "INVALID_FILTER",
            Self::ForeignKeyViolation => "FOREIGN_KEY_VIOLATION",
            Self::InvalidIdempotencyKey => "INVALID_IDEMPOTENCY_KEY",
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::InternalError => "INTERNAL_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::CircuitOpen => "CIRCUIT_OPEN",
            Self::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            Self::UpstreamUnavailable => "UPSTREAM_UNAVAILABLE",
            Self::UpstreamInvalidResponse => "UPSTREAM_INVALID_RESPONSE",
            Self::UpstreamRateLimited => "UPSTREAM_RATE_LIMITED",
            Self::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
            Self::IdempotencyStorage => "IDEMPOTENCY_STORAGE",
            Self::SerdeJsonError => "SERDE_JSON_ERROR",
        }
    }

    /// Integer code for structured logs and metrics.
    ///
    /// - 1000-1999: Client errors
    /// - 2000-2999: Database errors
    /// - 5000-5999: Serialization errors
    /// - 6000-6999: Upstream errors
    /// - 7000-7999: Idempotency errors
    pub fn code(&self) -> i32 {
        match self {
            Self::ValidationError => 1001,
            Self::InvalidUuid => 1002,
            Self::JsonExtraction => 1003,
            Self::NotFound => 1004,
            Self::InternalError => 1005,
            Self::Unauthorized => 1006,
            Self::Forbidden => 1007,
            Self::Conflict => 1008,
            Self::UnprocessableEntity => 1009,
            Self::ServiceUnavailable => 1011,
            Self::VersionConflict => 1012,
            Self::InvalidCursor => 1013,
            Self::InvalidFilter => 1014,
            Self::ForeignKeyViolation => 1015,
            Self::InvalidIdempotencyKey => 1016,
            Self::MethodNotAllowed => 1017,

            Self::DatabaseError => 2003,

            Self::SerdeJsonError => 5001,

            Self::CircuitOpen => 6001,
            Self::UpstreamTimeout => 6002,
            Self::UpstreamUnavailable => 6003,
            Self::UpstreamInvalidResponse => 6004,
            Self::UpstreamRateLimited => 6005,

            Self::IdempotencyConflict => 7001,
            Self::IdempotencyStorage => 7002,
        }
    }

    /// Default user-facing message; handlers may override it.
    pub fn default_message(&self) -> &'static str {
        match self {
            Self::ValidationError => "Request validation failed",
            Self::InvalidUuid => "Invalid UUID format",
            Self::JsonExtraction => "Failed to parse request body",
            Self::NotFound => "Resource not found",
            Self::Unauthorized => "Tenant and user context required",
            Self::Forbidden => "Access forbidden",
            Self::Conflict => "Resource already exists",
            Self::UnprocessableEntity => "Request cannot be processed",
            Self::VersionConflict => "Resource was modified by another request",
            Self::InvalidCursor => "Invalid pagination cursor",
            Self::InvalidFilter => "Invalid filter",
            Self::ForeignKeyViolation => "Referenced resource does not exist",
            Self::InvalidIdempotencyKey => "Invalid Idempotency-Key header",
            Self::MethodNotAllowed => "The HTTP method is not allowed for this resource",
            Self::InternalError => "An internal server error occurred",
            Self::ServiceUnavailable => "Service is temporarily unavailable",
            Self::DatabaseError => "Database error occurred",
            Self::CircuitOpen => "Upstream service is temporarily disabled",
            Self::UpstreamTimeout => "Upstream service timed out",
            Self::UpstreamUnavailable => "Upstream service is unavailable",
            Self::UpstreamInvalidResponse => "Upstream service returned an invalid response",
            Self::UpstreamRateLimited => "Upstream service is rate limiting requests",
            Self::IdempotencyConflict => "A request with this Idempotency-Key is already stored",
            Self::IdempotencyStorage => "Idempotency store error",
            Self::SerdeJsonError => "JSON serialization error",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_string_representation() {
        assert_eq!(ErrorCode::ValidationError.as_str(), "VALIDATION_ERROR");
        assert_eq!(ErrorCode::VersionConflict.as_str(), "VERSION_CONFLICT");
        assert_eq!(ErrorCode::CircuitOpen.as_str(), "CIRCUIT_OPEN");
    }

    #[test]
    fn test_error_code_ranges() {
        assert_eq!(ErrorCode::NotFound.code(), 1004);
        assert_eq!(ErrorCode::DatabaseError.code(), 2003);
        assert_eq!(ErrorCode::UpstreamTimeout.code(), 6002);
        assert_eq!(ErrorCode::IdempotencyStorage.code(), 7002);
    }

    #[test]
    fn test_error_code_serde_matches_as_str() {
        for code in [
            ErrorCode::InvalidCursor,
            ErrorCode::UpstreamRateLimited,
            ErrorCode::IdempotencyConflict,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
            let back: ErrorCode = serde_json::from_str(&json).unwrap();
            assert_eq!(back, code);
        }
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::InvalidFilter.to_string(), "INVALID_FILTER");
    }
}

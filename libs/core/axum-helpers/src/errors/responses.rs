//! Reusable OpenAPI response types for consistent API documentation.

use super::ErrorResponse;
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToResponse;

#[derive(ToResponse)]
#[response(
    description = "Internal Server Error",
    content_type = "application/json",
    example = json!({
        "code": 1005,
        "error": "INTERNAL_ERROR",
        "message": "An internal server error occurred"
    })
)]
pub struct InternalServerErrorResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Bad Request - Validation Error",
    content_type = "application/json",
    example = json!({
        "code": 1001,
        "error": "VALIDATION_ERROR",
        "message": "Request validation failed",
        "details": {
            "name": [{
                "code": "length",
                "message": "name must be 1 to 255 characters",
                "params": {"min": 1, "max": 255}
            }]
        }
    })
)]
pub struct BadRequestValidationResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Bad Request - Invalid cursor or filter",
    content_type = "application/json",
    example = json!({
        "code": 1013,
        "error": "INVALID_CURSOR",
        "message": "Invalid cursor: not base64"
    })
)]
pub struct BadRequestListingResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Missing or malformed tenant context",
    content_type = "application/json",
    example = json!({
        "code": 1006,
        "error": "UNAUTHORIZED",
        "message": "Missing X-Tenant-Id header"
    })
)]
pub struct UnauthorizedResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Resource not found",
    content_type = "application/json",
    example = json!({
        "code": 1004,
        "error": "NOT_FOUND",
        "message": "Entity not found"
    })
)]
pub struct NotFoundResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Conflict - duplicate resource or stale version",
    content_type = "application/json",
    example = json!({
        "code": 1012,
        "error": "VERSION_CONFLICT",
        "message": "Version conflict: expected version 1",
        "details": {"expected_version": 1}
    })
)]
pub struct ConflictResponse(pub ErrorResponse);

#[derive(ToResponse)]
#[response(
    description = "Upstream unavailable or circuit open",
    content_type = "application/json",
    example = json!({
        "code": 6001,
        "error": "CIRCUIT_OPEN",
        "message": "Upstream service is temporarily disabled",
        "details": {"service": "llm"}
    })
)]
pub struct ServiceUnavailableResponse(pub ErrorResponse);

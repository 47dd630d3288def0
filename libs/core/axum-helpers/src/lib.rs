//! # Axum Helpers
//!
//! Shared HTTP plumbing for the portal API.
//!
//! ## Modules
//!
//! - **[`server`]**: router assembly, health and readiness, graceful shutdown
//! - **[`http`]**: security headers middleware
//! - **[`errors`]**: [`AppError`] and the structured JSON error body
//! - **[`extractors`]**: tenant context, idempotency key, list params, UUID path, validated JSON
//! - **[`idempotency`]**: at-most-once execution of keyed writes
//! - **[`sanitize`]**: cleaning of names, titles and tags
//!
//! ## Quick Start
//!
//! ```ignore
//! use axum::Router;
//! use axum_helpers::server::{create_production_app, create_router};
//! use core_config::server::ServerConfig;
//! use utoipa::OpenApi;
//!
//! #[derive(OpenApi)]
//! #[openapi(paths())]
//! struct ApiDoc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api_routes = Router::new(); // Add your routes
//!     let router = create_router::<ApiDoc>(api_routes).await?;
//!
//!     let config = ServerConfig::default();
//!     create_production_app(router, &config, async {}).await?;
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod extractors;
pub mod http;
pub mod idempotency;
pub mod sanitize;
pub mod server;

// Re-export server types
pub use server::{
    CheckResult, CleanupCoordinator, HealthCheckFuture, HealthResponse, ReadyResponse,
    ShutdownCoordinator, build_router, create_production_app, create_router,
    health_router, portal_cors_layer, run_health_checks, shutdown_signal,
};

// Re-export HTTP middleware
pub use http::security_headers;

// Re-export error types
pub use errors::{AppError, ErrorCode, ErrorResponse};

// Re-export extractors
pub use extractors::{IdempotencyKey, ListParams, TenantContext, UuidPath, ValidatedJson};

pub use idempotency::{IdempotencyGuard, REPLAYED_HEADER};

//! Server infrastructure.
//!
//! - [`app`]: router assembly with OpenAPI docs and common layers
//! - [`health`]: liveness and readiness endpoints
//! - [`shutdown`]: signal handling and shutdown broadcast
//! - [`cleanup`]: connection release during shutdown
//!
//! ```ignore
//! let router = create_router::<ApiDoc>(api_routes).await?;
//! let app = router.merge(health_router(app_info!()));
//! create_production_app(app, &config.server, cleanup).await?;
//! ```

pub mod app;
pub mod cleanup;
pub mod health;
pub mod shutdown;

pub use app::{
    build_router, cors_origins_from_env, create_production_app, create_router,
    portal_cors_layer, serve_until_shutdown,
};
pub use cleanup::{CleanupCoordinator, close_postgres, close_redis};
pub use health::{
    CheckResult, HealthCheckFuture, HealthResponse, ReadyResponse, health_router, run_health_checks,
};
pub use shutdown::{ShutdownCoordinator, shutdown_signal};

//! Application state shared by the HTTP handlers.
//!
//! Cloned per router; every field is a cheap handle (pool, connection
//! manager or `Arc`).

use std::sync::Arc;

use axum_helpers::IdempotencyGuard;
use upstream::{BreakerRegistry, EmbeddingsClient, LlmClient};

#[derive(Clone)]
pub struct AppState {
    /// Configuration loaded from environment variables
    pub config: crate::config::Config,
    /// PostgreSQL connection pool
    pub db: database::postgres::DatabaseConnection,
    /// Redis connection manager
    pub redis: database::redis::ConnectionManager,
    /// One circuit breaker per upstream dependency
    pub breakers: Arc<BreakerRegistry>,
    pub llm: Arc<dyn LlmClient>,
    pub embeddings: Arc<dyn EmbeddingsClient>,
    /// Deduplicates retried POSTs against the configured store
    pub idempotency: IdempotencyGuard,
}

use std::sync::Arc;

use axum::middleware;
use axum_helpers::IdempotencyGuard;
use axum_helpers::server::{
    CleanupCoordinator, close_postgres, close_redis, create_production_app, health_router,
};
use core_config::idempotency::IdempotencyBackend;
use core_config::tracing::{init_tracing, install_color_eyre};
use database::idempotency::{
    IdempotencyStore, InMemoryIdempotencyStore, PgIdempotencyStore, RedisIdempotencyStore,
};
use tracing::{info, warn};
use upstream::{BreakerRegistry, OpenAiEmbeddingsClient, OpenAiLlmClient, UpstreamClient};

mod api;
mod config;
mod openapi;
mod state;

use config::Config;
use state::AppState;

fn idempotency_store(
    config: &Config,
    db: &database::postgres::DatabaseConnection,
    redis: &database::redis::ConnectionManager,
) -> Arc<dyn IdempotencyStore> {
    match config.idempotency.backend {
        IdempotencyBackend::Postgres => Arc::new(PgIdempotencyStore::new(db.clone())),
        IdempotencyBackend::Redis => Arc::new(RedisIdempotencyStore::new(
            redis.clone(),
            config.redis.key_prefix.clone(),
        )),
        IdempotencyBackend::Memory => {
            warn!("In-memory idempotency store: records are lost on restart and not shared between instances");
            Arc::new(InMemoryIdempotencyStore::new())
        }
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    install_color_eyre();

    let config = Config::from_env()?;

    init_tracing(&config.environment);
    observability::init_metrics()
        .map_err(|e| eyre::eyre!("Metrics recorder installation failed: {}", e))?;

    let postgres_future = async {
        database::postgres::connect_with_retry(&config.database, None)
            .await
            .map_err(|e| eyre::eyre!("PostgreSQL connection failed: {}", e))
    };

    let redis_future = async {
        database::redis::connect_with_retry(&config.redis, None)
            .await
            .map_err(|e| eyre::eyre!("Redis connection failed: {}", e))
    };

    let (db, redis) = tokio::try_join!(postgres_future, redis_future)?;

    database::postgres::run_migrations::<migration::Migrator>(&db).await?;

    let breakers = Arc::new(BreakerRegistry::new(config.breaker.clone()));
    let llm = OpenAiLlmClient::new(UpstreamClient::new(
        config.llm.clone(),
        breakers.get_or_create(&config.llm.name),
    )?);
    let embeddings = OpenAiEmbeddingsClient::new(UpstreamClient::new(
        config.embeddings.clone(),
        breakers.get_or_create(&config.embeddings.name),
    )?);
    info!(
        llm = %config.llm.base_url,
        embeddings = %config.embeddings.base_url,
        "Upstream clients configured"
    );

    let idempotency = IdempotencyGuard::new(
        idempotency_store(&config, &db, &redis),
        config.idempotency.ttl,
    );
    info!(backend = ?config.idempotency.backend, ttl = ?config.idempotency.ttl, "Idempotency store ready");

    let state = AppState {
        config,
        db,
        redis,
        breakers,
        llm: Arc::new(llm),
        embeddings: Arc::new(embeddings),
        idempotency,
    };

    let api_routes = api::routes(&state);

    // create_router adds docs, CORS and the /api prefix
    let router = axum_helpers::create_router::<openapi::ApiDoc>(api_routes).await?;

    let app = router
        .merge(health_router(state.config.app.clone()))
        .merge(api::ready_router(state.clone()))
        .merge(api::metrics_router())
        .layer(middleware::from_fn(observability::metrics_middleware));

    info!(
        "Starting ML Portal API (shutdown timeout {:?})",
        state.config.server.shutdown_timeout
    );

    let server_config = state.config.server.clone();
    create_production_app(app, &server_config, async move {
        info!("Shutting down: closing connections");

        let mut cleanup = CleanupCoordinator::new();
        cleanup.add_task("postgres", close_postgres(state.db, "portal"));
        cleanup.add_task("redis", close_redis(state.redis, "portal"));
        cleanup.run().await;
    })
    .await
    .map_err(|e| eyre::eyre!("Server error: {}", e))?;

    info!("ML Portal API shutdown complete");
    Ok(())
}

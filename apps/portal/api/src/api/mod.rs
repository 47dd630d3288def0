use axum::Router;
use axum::routing::get;

use domain_chats::{ChatService, PostgresChatRepository};
use domain_documents::{DocumentService, PostgresDocumentRepository};
use domain_users::{PostgresUserRepository, UserService};

use crate::state::AppState;

pub mod embeddings;
pub mod health;
pub mod idempotency;

/// Creates the API routes without the `/api` prefix.
/// The `/api` prefix is added by `axum_helpers::create_router`.
///
/// Every sub-router carries its own state, so the result is stateless.
pub fn routes(state: &AppState) -> Router {
    let users = UserService::new(PostgresUserRepository::postgres(state.db.clone()));
    let chats = ChatService::new(
        PostgresChatRepository::new(state.db.clone()),
        state.llm.clone(),
    );
    let documents = DocumentService::new(PostgresDocumentRepository::postgres(state.db.clone()));

    Router::new()
        .nest(
            "/users",
            domain_users::handlers::router(users, state.idempotency.clone()),
        )
        .nest(
            "/chats",
            domain_chats::handlers::router(chats, state.idempotency.clone()),
        )
        .nest(
            "/documents",
            domain_documents::handlers::router(documents, state.idempotency.clone()),
        )
        .nest("/embeddings", embeddings::router(state.embeddings.clone()))
        .nest("/idempotency", idempotency::router(state.idempotency.clone()))
}

/// `/ready` with real dependency checks, merged next to the stateless app.
pub fn ready_router(state: AppState) -> Router {
    Router::new()
        .route("/ready", get(health::ready_handler))
        .with_state(state)
}

/// Prometheus scrape endpoint
pub fn metrics_router() -> Router {
    Router::new().route("/metrics", get(observability::metrics_handler))
}

//! Maintenance endpoint for stored idempotent responses.

use axum::{Json, Router, extract::State, routing::post};
use axum_helpers::{AppError, IdempotencyGuard, TenantContext};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::{OpenApi, ToSchema};

#[derive(OpenApi)]
#[openapi(
    paths(cleanup_expired),
    components(schemas(CleanupResponse)),
    tags((name = "idempotency", description = "Stored idempotent responses"))
)]
pub struct IdempotencyApiDoc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CleanupResponse {
    /// Expired records deleted for the caller's tenant
    pub removed: u64,
}

pub fn router(guard: IdempotencyGuard) -> Router {
    Router::new()
        .route("/cleanup", post(cleanup_expired))
        .with_state(guard)
}

/// Delete the caller tenant's expired idempotency records
///
/// The Redis backend expires keys on its own and always reports 0.
#[utoipa::path(
    post,
    path = "/cleanup",
    tag = "idempotency",
    responses(
        (status = 200, description = "Expired records removed", body = CleanupResponse),
        (status = 401, description = "Missing tenant context")
    )
)]
pub async fn cleanup_expired(
    State(guard): State<IdempotencyGuard>,
    ctx: TenantContext,
) -> Result<Json<CleanupResponse>, AppError> {
    let removed = guard.store().cleanup_expired(ctx.tenant_id).await?;
    info!(tenant_id = %ctx.tenant_id, removed, "Expired idempotency records removed");
    Ok(Json(CleanupResponse { removed }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use chrono::{Duration as ChronoDuration, Utc};
    use database::idempotency::{
        CachedResponse, IdempotencyStore, IdempotentRequest, InMemoryIdempotencyStore,
    };
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn cleanup_request(tenant_id: Uuid) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/idempotency/cleanup")
            .header("x-tenant-id", tenant_id.to_string())
            .header("x-user-id", Uuid::new_v4().to_string())
            .body(Body::empty())
            .unwrap()
    }

    async fn removed(app: &Router, tenant_id: Uuid) -> u64 {
        let response = app.clone().oneshot(cleanup_request(tenant_id)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice::<CleanupResponse>(&bytes).unwrap().removed
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired_records_of_caller_tenant() {
        let store = Arc::new(InMemoryIdempotencyStore::new());
        let (tenant, other_tenant, user) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let created = CachedResponse {
            status: 201,
            body: json!({ "id": 1 }),
        };
        let past = Utc::now() - ChronoDuration::minutes(5);
        let future = Utc::now() + ChronoDuration::hours(1);

        for (tenant_id, key, ttl_at) in [
            (tenant, "expired", past),
            (tenant, "live", future),
            (other_tenant, "expired", past),
        ] {
            let request = IdempotentRequest::new(tenant_id, user, key, "POST", "/api/chats", b"{}");
            store
                .store_response(&request, created.clone(), ttl_at)
                .await
                .unwrap();
        }

        let app = Router::new().nest(
            "/idempotency",
            router(IdempotencyGuard::new(store.clone(), Duration::from_secs(60))),
        );

        assert_eq!(removed(&app, tenant).await, 1);
        assert_eq!(removed(&app, tenant).await, 0);
        assert_eq!(store.len().await, 2);
        assert_eq!(removed(&app, other_tenant).await, 1);
    }

    #[tokio::test]
    async fn test_cleanup_requires_tenant_headers() {
        let app = Router::new().nest(
            "/idempotency",
            router(IdempotencyGuard::new(
                Arc::new(InMemoryIdempotencyStore::new()),
                Duration::from_secs(60),
            )),
        );

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/idempotency/cleanup")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}

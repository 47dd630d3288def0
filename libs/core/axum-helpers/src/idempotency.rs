//! At-most-once execution of writes that carry an `Idempotency-Key`.
//!
//! The first successful execution stores `(status, body)` under
//! `(tenant, user, key, hash(method, path, body))`. A retry with the same
//! key and the same request gets the stored response back, marked with
//! `Idempotent-Replayed: true`, and the handler does not run again. Failed
//! executions are not stored, so the client may retry them.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{TimeDelta, Utc};
use database::idempotency::{
    CachedResponse, IdempotencyError, IdempotencyRecord, IdempotencyStore, IdempotentRequest,
};
use observability::IdempotencyMetrics;
use serde::Serialize;

use crate::errors::AppError;
use crate::extractors::{IdempotencyKey, TenantContext};

pub const REPLAYED_HEADER: &str = "idempotent-replayed";

/// Shared handle to the configured idempotency store.
#[derive(Clone)]
pub struct IdempotencyGuard {
    store: Arc<dyn IdempotencyStore>,
    ttl: Duration,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn IdempotencyStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn store(&self) -> &Arc<dyn IdempotencyStore> {
        &self.store
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Runs `operation` unless a live response for this request is stored.
    ///
    /// Without a key the operation always runs. `request_body` is the
    /// deserialized payload; it is re-serialized for hashing so formatting
    /// differences in the raw JSON do not defeat deduplication.
    pub async fn run<B, T, F, Fut>(
        &self,
        ctx: &TenantContext,
        key: Option<&IdempotencyKey>,
        method: &Method,
        path: &str,
        request_body: &B,
        operation: F,
    ) -> Result<Response, AppError>
    where
        B: Serialize + ?Sized,
        T: Serialize,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(StatusCode, T), AppError>>,
    {
        let Some(key) = key else {
            let (status, value) = operation().await?;
            return Ok((status, Json(value)).into_response());
        };

        let body = serde_json::to_vec(request_body)?;
        let request = IdempotentRequest::new(
            ctx.tenant_id,
            ctx.user_id,
            key.as_str(),
            method.as_str(),
            path,
            &body,
        );

        if let Some(record) = self.store.lookup(&request).await? {
            tracing::info!(key = %key.as_str(), path, "Replaying stored response");
            IdempotencyMetrics::record_replay(path);
            return Ok(replay(&record));
        }

        let (status, value) = operation().await?;
        let body = serde_json::to_value(&value)?;
        let cached = CachedResponse {
            status: status.as_u16(),
            body: body.clone(),
        };

        match self.store.store_response(&request, cached, self.ttl_at()).await {
            Ok(_) => IdempotencyMetrics::record_stored(path),
            // A concurrent first execution stored its response first.
            Err(IdempotencyError::Duplicate { key, existing }) => {
                tracing::warn!(key = %key, path, "Idempotent request executed concurrently");
                if let Some(record) = existing {
                    IdempotencyMetrics::record_replay(path);
                    return Ok(replay(&record));
                }
            }
            // The write already happened; failing now would invite a retry.
            Err(e) => {
                tracing::error!(error = %e, path, "Failed to store idempotent response");
            }
        }

        Ok((status, Json(body)).into_response())
    }

    fn ttl_at(&self) -> chrono::DateTime<Utc> {
        let ttl = TimeDelta::from_std(self.ttl).unwrap_or(TimeDelta::days(1));
        Utc::now() + ttl
    }
}

fn replay(record: &IdempotencyRecord) -> Response {
    let status = StatusCode::from_u16(record.response.status).unwrap_or(StatusCode::OK);
    let mut response = (status, Json(record.response.body.clone())).into_response();
    response
        .headers_mut()
        .insert(REPLAYED_HEADER, HeaderValue::from_static("true"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use database::idempotency::InMemoryIdempotencyStore;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    fn guard() -> (IdempotencyGuard, InMemoryIdempotencyStore) {
        let store = InMemoryIdempotencyStore::new();
        (
            IdempotencyGuard::new(Arc::new(store.clone()), Duration::from_secs(60)),
            store,
        )
    }

    async fn body_of(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create_chat(
        guard: &IdempotencyGuard,
        ctx: &TenantContext,
        key: Option<&IdempotencyKey>,
        payload: &Value,
        calls: &AtomicU32,
    ) -> Response {
        guard
            .run(ctx, key, &Method::POST, "/api/chats", payload, || async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok((StatusCode::CREATED, json!({ "id": n, "name": payload["name"] })))
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_same_key_and_body_executes_once() {
        let (guard, store) = guard();
        let ctx = TenantContext::new(Uuid::new_v4(), Uuid::new_v4());
        let key = IdempotencyKey("create-1".to_string());
        let payload = json!({ "name": "Sprint Planning" });
        let calls = AtomicU32::new(0);

        let first = create_chat(&guard, &ctx, Some(&key), &payload, &calls).await;
        assert_eq!(first.status(), StatusCode::CREATED);
        assert!(first.headers().get(REPLAYED_HEADER).is_none());
        let first_body = body_of(first).await;

        let second = create_chat(&guard, &ctx, Some(&key), &payload, &calls).await;
        assert_eq!(second.status(), StatusCode::CREATED);
        assert_eq!(second.headers()[REPLAYED_HEADER], "true");
        assert_eq!(body_of(second).await, first_body);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_same_key_with_different_body_is_a_new_request() {
        let (guard, store) = guard();
        let ctx = TenantContext::new(Uuid::new_v4(), Uuid::new_v4());
        let key = IdempotencyKey("create-1".to_string());
        let calls = AtomicU32::new(0);

        create_chat(&guard, &ctx, Some(&key), &json!({ "name": "a" }), &calls).await;
        create_chat(&guard, &ctx, Some(&key), &json!({ "name": "b" }), &calls).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_keys_are_scoped_to_the_user() {
        let (guard, _) = guard();
        let tenant = Uuid::new_v4();
        let key = IdempotencyKey("create-1".to_string());
        let payload = json!({ "name": "a" });
        let calls = AtomicU32::new(0);

        create_chat(&guard, &TenantContext::new(tenant, Uuid::new_v4()), Some(&key), &payload, &calls).await;
        create_chat(&guard, &TenantContext::new(tenant, Uuid::new_v4()), Some(&key), &payload, &calls).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_without_key_always_executes() {
        let (guard, store) = guard();
        let ctx = TenantContext::new(Uuid::new_v4(), Uuid::new_v4());
        let payload = json!({ "name": "a" });
        let calls = AtomicU32::new(0);

        create_chat(&guard, &ctx, None, &payload, &calls).await;
        create_chat(&guard, &ctx, None, &payload, &calls).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_failures_are_not_stored() {
        let (guard, store) = guard();
        let ctx = TenantContext::new(Uuid::new_v4(), Uuid::new_v4());
        let key = IdempotencyKey("create-1".to_string());

        let result = guard
            .run(&ctx, Some(&key), &Method::POST, "/api/chats", &json!({}), || async {
                Err::<(StatusCode, Value), _>(AppError::ServiceUnavailable("llm down".into()))
            })
            .await;

        assert!(result.is_err());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_winner_response_is_returned() {
        let (guard, store) = guard();
        let ctx = TenantContext::new(Uuid::new_v4(), Uuid::new_v4());
        let key = IdempotencyKey("create-1".to_string());
        let payload = json!({ "name": "a" });
        let request = IdempotentRequest::new(
            ctx.tenant_id,
            ctx.user_id,
            key.as_str(),
            "POST",
            "/api/chats",
            &serde_json::to_vec(&payload).unwrap(),
        );

        let response = guard
            .run(&ctx, Some(&key), &Method::POST, "/api/chats", &payload, || async {
                // Another request with the same key finishes first.
                let winner = CachedResponse {
                    status: 201,
                    body: json!({ "id": "winner" }),
                };
                store
                    .store_response(&request, winner, Utc::now() + TimeDelta::minutes(1))
                    .await
                    .unwrap();
                Ok((StatusCode::CREATED, json!({ "id": "loser" })))
            })
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[REPLAYED_HEADER], "true");
        assert_eq!(body_of(response).await, json!({ "id": "winner" }));
        assert_eq!(store.len().await, 1);
    }
}

//! Idempotency stores against real Postgres and Redis (requires Docker).

use chrono::{Duration, Utc};
use database::idempotency::{
    CachedResponse, IdempotencyError, IdempotencyStore, IdempotentRequest, PgIdempotencyStore,
    RedisIdempotencyStore,
};
use serde_json::json;
use test_utils::{TestDataBuilder, TestDatabase, TestRedis};

fn request(builder: &TestDataBuilder, key: &str, body: &[u8]) -> IdempotentRequest {
    IdempotentRequest::new(
        builder.tenant_id(),
        builder.user_id(),
        key,
        "POST",
        "/api/chats",
        body,
    )
}

fn created(id: &str) -> CachedResponse {
    CachedResponse {
        status: 201,
        body: json!({ "id": id }),
    }
}

async fn assert_replay_contract(store: &dyn IdempotencyStore, builder: &TestDataBuilder) {
    let ttl_at = Utc::now() + Duration::hours(1);
    let first = request(builder, "key1", br#"{"name":"a"}"#);

    store
        .store_response(&first, created("first"), ttl_at)
        .await
        .unwrap();

    match store.store_response(&first, created("second"), ttl_at).await {
        Err(IdempotencyError::Duplicate { existing, .. }) => {
            let existing = existing.expect("duplicate carries the stored record");
            assert_eq!(existing.response.body, json!({ "id": "first" }));
        }
        other => panic!("expected duplicate, got {other:?}"),
    }

    let other_body = request(builder, "key1", br#"{"name":"b"}"#);
    store
        .store_response(&other_body, created("other"), ttl_at)
        .await
        .unwrap();

    let found = store.lookup(&first).await.unwrap().unwrap();
    assert_eq!(found.response.status, 201);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_postgres_store_replays_and_separates_hashes() {
    let db = TestDatabase::new().await;
    let store = PgIdempotencyStore::new(db.connection());
    let builder = TestDataBuilder::from_test_name("pg_idempotency");

    assert_replay_contract(&store, &builder).await;
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_postgres_cleanup_removes_only_expired_rows_of_tenant() {
    let db = TestDatabase::new().await;
    let store = PgIdempotencyStore::new(db.connection());
    let builder = TestDataBuilder::from_test_name("pg_cleanup");
    let other = TestDataBuilder::new(7);

    let expired = Utc::now() - Duration::seconds(1);
    store
        .store_response(&request(&builder, "old", b"{}"), created("old"), expired)
        .await
        .unwrap();
    store
        .store_response(&request(&other, "old", b"{}"), created("foreign"), expired)
        .await
        .unwrap();
    store
        .store_response(
            &request(&builder, "live", b"{}"),
            created("live"),
            Utc::now() + Duration::hours(1),
        )
        .await
        .unwrap();

    assert_eq!(store.cleanup_expired(builder.tenant_id()).await.unwrap(), 1);
    assert!(
        store
            .lookup(&request(&builder, "live", b"{}"))
            .await
            .unwrap()
            .is_some()
    );
    // The other tenant's expired row is still there for its own cleanup
    assert_eq!(store.cleanup_expired(other.tenant_id()).await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_postgres_expired_record_is_overwritten() {
    let db = TestDatabase::new().await;
    let store = PgIdempotencyStore::new(db.connection());
    let builder = TestDataBuilder::from_test_name("pg_overwrite");
    let req = request(&builder, "key", b"{}");

    store
        .store_response(&req, created("stale"), Utc::now() - Duration::seconds(1))
        .await
        .unwrap();
    store
        .store_response(&req, created("fresh"), Utc::now() + Duration::hours(1))
        .await
        .unwrap();

    let found = store.lookup(&req).await.unwrap().unwrap();
    assert_eq!(found.response.body, json!({ "id": "fresh" }));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_store_replays_and_separates_hashes() {
    let redis = TestRedis::new().await;
    let store = RedisIdempotencyStore::new(redis.connection_manager().await, "test");
    let builder = TestDataBuilder::from_test_name("redis_idempotency");

    assert_replay_contract(&store, &builder).await;
    assert_eq!(store.cleanup_expired(builder.tenant_id()).await.unwrap(), 0);
}

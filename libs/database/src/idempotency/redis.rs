use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::debug;
use uuid::Uuid;

use super::{
    CachedResponse, IdempotencyError, IdempotencyRecord, IdempotencyResult, IdempotencyStore,
    IdempotentRequest,
};

/// Idempotency records as JSON strings written with `SET NX PX`.
///
/// Redis evicts a record when its TTL lapses, so a later store under the same
/// key simply succeeds.
#[derive(Clone)]
pub struct RedisIdempotencyStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisIdempotencyStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    fn key_for(&self, request: &IdempotentRequest) -> String {
        record_key(&self.prefix, request)
    }
}

pub(crate) fn record_key(prefix: &str, request: &IdempotentRequest) -> String {
    format!(
        "{}:idem:{}:{}:{}:{}",
        prefix, request.tenant_id, request.user_id, request.key, request.request_hash
    )
}

fn ttl_millis(ttl_at: DateTime<Utc>) -> u64 {
    (ttl_at - Utc::now()).num_milliseconds().max(0) as u64
}

fn storage(err: redis::RedisError) -> IdempotencyError {
    IdempotencyError::Storage(err.to_string())
}

#[async_trait]
impl IdempotencyStore for RedisIdempotencyStore {
    async fn store_response(
        &self,
        request: &IdempotentRequest,
        response: CachedResponse,
        ttl_at: DateTime<Utc>,
    ) -> IdempotencyResult<IdempotencyRecord> {
        let record = IdempotencyRecord::new(request, response, ttl_at);
        let millis = ttl_millis(ttl_at);
        if millis == 0 {
            // Already expired; nothing would survive the write.
            return Ok(record);
        }

        let payload = serde_json::to_string(&record)
            .map_err(|e| IdempotencyError::Serialization(e.to_string()))?;
        let key = self.key_for(request);

        let mut conn = self.conn.clone();
        let written: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(payload)
            .arg("NX")
            .arg("PX")
            .arg(millis)
            .query_async(&mut conn)
            .await
            .map_err(storage)?;

        if written.is_some() {
            return Ok(record);
        }

        debug!(key = %request.key, "Idempotency key already holds a live response");
        Err(IdempotencyError::Duplicate {
            key: request.key.clone(),
            existing: self.lookup(request).await?.map(Box::new),
        })
    }

    async fn lookup(&self, request: &IdempotentRequest) -> IdempotencyResult<Option<IdempotencyRecord>> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.get(self.key_for(request)).await.map_err(storage)?;

        payload
            .map(|raw| {
                serde_json::from_str::<IdempotencyRecord>(&raw)
                    .map_err(|e| IdempotencyError::Serialization(e.to_string()))
            })
            .transpose()
            .map(|record| record.filter(|r| r.is_live_at(Utc::now())))
    }

    /// Redis expires records on its own; nothing is left to remove.
    async fn cleanup_expired(&self, tenant_id: Uuid) -> IdempotencyResult<u64> {
        debug!(%tenant_id, "Redis idempotency records expire via TTL");
        Ok(0)
    }
}

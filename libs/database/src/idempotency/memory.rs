use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    CachedResponse, IdempotencyError, IdempotencyRecord, IdempotencyResult, IdempotencyStore,
    IdempotentRequest,
};

type CompositeKey = (Uuid, Uuid, String, String);

fn composite_key(request: &IdempotentRequest) -> CompositeKey {
    (
        request.tenant_id,
        request.user_id,
        request.key.clone(),
        request.request_hash.clone(),
    )
}

/// Process-local idempotency store.
#[derive(Clone, Default)]
pub struct InMemoryIdempotencyStore {
    records: Arc<RwLock<HashMap<CompositeKey, IdempotencyRecord>>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn store_response(
        &self,
        request: &IdempotentRequest,
        response: CachedResponse,
        ttl_at: DateTime<Utc>,
    ) -> IdempotencyResult<IdempotencyRecord> {
        let mut records = self.records.write().await;
        let id = composite_key(request);

        if let Some(existing) = records.get(&id)
            && existing.is_live_at(Utc::now())
        {
            return Err(IdempotencyError::Duplicate {
                key: request.key.clone(),
                existing: Some(Box::new(existing.clone())),
            });
        }

        let record = IdempotencyRecord::new(request, response, ttl_at);
        records.insert(id, record.clone());
        Ok(record)
    }

    async fn lookup(&self, request: &IdempotentRequest) -> IdempotencyResult<Option<IdempotencyRecord>> {
        let records = self.records.read().await;
        Ok(records
            .get(&composite_key(request))
            .filter(|record| record.is_live_at(Utc::now()))
            .cloned())
    }

    async fn cleanup_expired(&self, tenant_id: Uuid) -> IdempotencyResult<u64> {
        let now = Utc::now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.tenant_id != tenant_id || record.is_live_at(now));
        Ok((before - records.len()) as u64)
    }
}

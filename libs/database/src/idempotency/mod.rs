//! Idempotency records for retry-safe writes.
//!
//! A record is keyed by `(tenant_id, user_id, idempotency_key, request_hash)`
//! where the hash covers the request's method, path and body. Storing a
//! second live record under the same composite key fails with
//! [`IdempotencyError::Duplicate`], carrying the first response so the caller
//! can replay it. The same key with a different body is an unrelated record.
//!
//! Expiry is logical: lookups ignore records whose `ttl_at` has passed, and
//! [`IdempotencyStore::cleanup_expired`] removes them. The Redis store also
//! lets Redis evict them.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;
#[cfg(feature = "redis")]
mod redis;

pub use memory::InMemoryIdempotencyStore;
#[cfg(feature = "postgres")]
pub use postgres::PgIdempotencyStore;
#[cfg(feature = "redis")]
pub use redis::RedisIdempotencyStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum IdempotencyError {
    #[error("Idempotency key '{key}' already has a stored response")]
    Duplicate {
        key: String,
        existing: Option<Box<IdempotencyRecord>>,
    },

    #[error("Failed to encode idempotency record: {0}")]
    Serialization(String),

    #[error("Idempotency storage error: {0}")]
    Storage(String),
}

pub type IdempotencyResult<T> = Result<T, IdempotencyError>;

/// SHA-256 over the method, path and raw body, hex encoded.
pub fn request_hash(method: &str, path: &str, body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(method.to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(path.as_bytes());
    hasher.update(b"\n");
    hasher.update(body);
    format!("{:x}", hasher.finalize())
}

/// The request half of the composite key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotentRequest {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub key: String,
    pub request_hash: String,
}

impl IdempotentRequest {
    pub fn new(
        tenant_id: Uuid,
        user_id: Uuid,
        key: impl Into<String>,
        method: &str,
        path: &str,
        body: &[u8],
    ) -> Self {
        Self {
            tenant_id,
            user_id,
            key: key.into(),
            request_hash: request_hash(method, path, body),
        }
    }
}

/// The response replayed for a repeated request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub idempotency_key: String,
    pub request_hash: String,
    pub response: CachedResponse,
    pub created_at: DateTime<Utc>,
    pub ttl_at: DateTime<Utc>,
}

impl IdempotencyRecord {
    pub fn new(request: &IdempotentRequest, response: CachedResponse, ttl_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            tenant_id: request.tenant_id,
            user_id: request.user_id,
            idempotency_key: request.key.clone(),
            request_hash: request.request_hash.clone(),
            response,
            created_at: crate::repository::now_utc(),
            ttl_at,
        }
    }

    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        self.ttl_at > now
    }
}

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Persists the response of a first execution.
    async fn store_response(
        &self,
        request: &IdempotentRequest,
        response: CachedResponse,
        ttl_at: DateTime<Utc>,
    ) -> IdempotencyResult<IdempotencyRecord>;

    /// The live record for this request, if any.
    async fn lookup(&self, request: &IdempotentRequest) -> IdempotencyResult<Option<IdempotencyRecord>>;

    /// Deletes the tenant's expired records and returns how many went away.
    async fn cleanup_expired(&self, tenant_id: Uuid) -> IdempotencyResult<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_hash_is_stable_and_method_insensitive() {
        let a = request_hash("post", "/api/chats", br#"{"name":"x"}"#);
        let b = request_hash("POST", "/api/chats", br#"{"name":"x"}"#);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_request_hash_covers_path_and_body() {
        let base = request_hash("POST", "/api/chats", b"{}");
        assert_ne!(base, request_hash("POST", "/api/documents", b"{}"));
        assert_ne!(base, request_hash("POST", "/api/chats", b"{ }"));
        assert_ne!(base, request_hash("PUT", "/api/chats", b"{}"));
    }

    #[test]
    fn test_record_liveness() {
        let request = IdempotentRequest::new(Uuid::new_v4(), Uuid::new_v4(), "k", "POST", "/", b"");
        let now = Utc::now();
        let record = IdempotencyRecord::new(
            &request,
            CachedResponse {
                status: 201,
                body: serde_json::json!({}),
            },
            now + chrono::Duration::seconds(10),
        );
        assert!(record.is_live_at(now));
        assert!(!record.is_live_at(now + chrono::Duration::seconds(11)));
    }
}

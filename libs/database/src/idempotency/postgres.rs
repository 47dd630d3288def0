use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, FromQueryResult, Statement};
use tracing::debug;
use uuid::Uuid;

use super::{
    CachedResponse, IdempotencyError, IdempotencyRecord, IdempotencyResult, IdempotencyStore,
    IdempotentRequest,
};

const COLUMNS: &str = "id, tenant_id, user_id, idempotency_key, request_hash, \
                       response_status, response_body, created_at, ttl_at";

/// Idempotency records in the `idempotency_keys` table.
///
/// The insert is a single `ON CONFLICT` statement: a live row under the same
/// composite key wins, an expired one is overwritten in place.
#[derive(Clone)]
pub struct PgIdempotencyStore {
    db: DatabaseConnection,
}

impl PgIdempotencyStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[derive(Debug, FromQueryResult)]
struct IdempotencyRow {
    id: Uuid,
    tenant_id: Uuid,
    user_id: Uuid,
    idempotency_key: String,
    request_hash: String,
    response_status: i32,
    response_body: serde_json::Value,
    created_at: DateTime<Utc>,
    ttl_at: DateTime<Utc>,
}

impl TryFrom<IdempotencyRow> for IdempotencyRecord {
    type Error = IdempotencyError;

    fn try_from(row: IdempotencyRow) -> Result<Self, Self::Error> {
        let status = u16::try_from(row.response_status).map_err(|_| {
            IdempotencyError::Serialization(format!("invalid stored status {}", row.response_status))
        })?;

        Ok(IdempotencyRecord {
            id: row.id,
            tenant_id: row.tenant_id,
            user_id: row.user_id,
            idempotency_key: row.idempotency_key,
            request_hash: row.request_hash,
            response: CachedResponse {
                status,
                body: row.response_body,
            },
            created_at: row.created_at,
            ttl_at: row.ttl_at,
        })
    }
}

fn storage(err: sea_orm::DbErr) -> IdempotencyError {
    IdempotencyError::Storage(err.to_string())
}

#[async_trait]
impl IdempotencyStore for PgIdempotencyStore {
    async fn store_response(
        &self,
        request: &IdempotentRequest,
        response: CachedResponse,
        ttl_at: DateTime<Utc>,
    ) -> IdempotencyResult<IdempotencyRecord> {
        let record = IdempotencyRecord::new(request, response, ttl_at);
        let sql = format!(
            r#"
            INSERT INTO idempotency_keys ({COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (tenant_id, user_id, idempotency_key, request_hash) DO UPDATE
                SET id = EXCLUDED.id,
                    response_status = EXCLUDED.response_status,
                    response_body = EXCLUDED.response_body,
                    created_at = EXCLUDED.created_at,
                    ttl_at = EXCLUDED.ttl_at
                WHERE idempotency_keys.ttl_at <= EXCLUDED.created_at
            RETURNING {COLUMNS}
            "#
        );

        let inserted = IdempotencyRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [
                record.id.into(),
                record.tenant_id.into(),
                record.user_id.into(),
                record.idempotency_key.clone().into(),
                record.request_hash.clone().into(),
                i32::from(record.response.status).into(),
                record.response.body.clone().into(),
                record.created_at.into(),
                record.ttl_at.into(),
            ],
        ))
        .one(&self.db)
        .await
        .map_err(storage)?;

        match inserted {
            Some(row) => row.try_into(),
            None => {
                debug!(key = %request.key, "Idempotency key already holds a live response");
                let existing = self.lookup(request).await?;
                Err(IdempotencyError::Duplicate {
                    key: request.key.clone(),
                    existing: existing.map(Box::new),
                })
            }
        }
    }

    async fn lookup(&self, request: &IdempotentRequest) -> IdempotencyResult<Option<IdempotencyRecord>> {
        let sql = format!(
            r#"
            SELECT {COLUMNS} FROM idempotency_keys
            WHERE tenant_id = $1 AND user_id = $2 AND idempotency_key = $3
              AND request_hash = $4 AND ttl_at > $5
            "#
        );

        let row = IdempotencyRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            [
                request.tenant_id.into(),
                request.user_id.into(),
                request.key.clone().into(),
                request.request_hash.clone().into(),
                Utc::now().into(),
            ],
        ))
        .one(&self.db)
        .await
        .map_err(storage)?;

        row.map(IdempotencyRecord::try_from).transpose()
    }

    async fn cleanup_expired(&self, tenant_id: Uuid) -> IdempotencyResult<u64> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "DELETE FROM idempotency_keys WHERE tenant_id = $1 AND ttl_at <= $2",
            [tenant_id.into(), Utc::now().into()],
        );

        let result = self.db.execute_raw(stmt).await.map_err(storage)?;
        debug!(%tenant_id, removed = result.rows_affected(), "Expired idempotency records removed");
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn row(request: &IdempotentRequest, status: i32, body: serde_json::Value) -> BTreeMap<&'static str, Value> {
        let now = Utc::now();
        BTreeMap::from([
            ("id", Value::from(Uuid::new_v4())),
            ("tenant_id", Value::from(request.tenant_id)),
            ("user_id", Value::from(request.user_id)),
            ("idempotency_key", Value::from(request.key.clone())),
            ("request_hash", Value::from(request.request_hash.clone())),
            ("response_status", Value::from(status)),
            ("response_body", Value::from(body)),
            ("created_at", Value::from(now)),
            ("ttl_at", Value::from(now + Duration::hours(1))),
        ])
    }

    fn request() -> IdempotentRequest {
        IdempotentRequest::new(Uuid::new_v4(), Uuid::new_v4(), "key-1", "POST", "/api/chats", b"{}")
    }

    #[tokio::test]
    async fn test_store_returns_inserted_record() {
        let request = request();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![row(&request, 201, json!({"id": 1}))]])
            .into_connection();
        let store = PgIdempotencyStore::new(db);

        let record = store
            .store_response(
                &request,
                CachedResponse { status: 201, body: json!({"id": 1}) },
                Utc::now() + Duration::hours(1),
            )
            .await
            .unwrap();

        assert_eq!(record.response.status, 201);
        assert_eq!(record.idempotency_key, "key-1");
    }

    #[tokio::test]
    async fn test_conflict_with_live_row_is_duplicate_with_existing() {
        let request = request();
        let empty: Vec<BTreeMap<&'static str, Value>> = vec![];
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([empty, vec![row(&request, 201, json!({"id": "first"}))]])
            .into_connection();
        let store = PgIdempotencyStore::new(db);

        let err = store
            .store_response(
                &request,
                CachedResponse { status: 201, body: json!({"id": "second"}) },
                Utc::now() + Duration::hours(1),
            )
            .await
            .unwrap_err();

        match err {
            IdempotencyError::Duplicate { existing: Some(existing), .. } => {
                assert_eq!(existing.response.body, json!({"id": "first"}));
            }
            other => panic!("expected duplicate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cleanup_reports_rows_affected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 3,
            }])
            .into_connection();
        let store = PgIdempotencyStore::new(db);

        assert_eq!(store.cleanup_expired(Uuid::new_v4()).await.unwrap(), 3);
    }
}

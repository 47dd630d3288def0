//! Persistence layer for the portal: connections, the tenant-scoped
//! repository and the idempotency store.
//!
//! # Features
//!
//! - `postgres` (default): SeaORM repository, transactions, Postgres idempotency store
//! - `redis` (default): Redis connector and idempotency store
//! - `config`: `core_config::FromEnv` for [`postgres::PostgresConfig`] and [`redis::RedisConfig`]
//! - `all`: everything above
//!
//! The in-memory repository and idempotency store are always available.
//!
//! # Example
//!
//! ```ignore
//! use database::postgres::{self, PostgresConfig};
//! use database::repository::{ListQuery, PgTenantRepository, TenantRepository};
//!
//! let db = postgres::connect_with_retry(&PostgresConfig::new(url), None).await?;
//! postgres::run_migrations::<migration::Migrator>(&db).await?;
//!
//! let chats = PgTenantRepository::<chat::Entity>::new(db.clone());
//! let page = chats.list(tenant_id, ListQuery::new().with_limit(20)).await?;
//! ```

pub mod common;
pub mod idempotency;
pub mod repository;

#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "postgres")]
pub mod transaction;

#[cfg(feature = "redis")]
pub mod redis;

pub use common::{DatabaseError, DatabaseResult};
#[cfg(feature = "postgres")]
pub use transaction::{TxFuture, with_transaction};

//! Tenant-scoped repository layer.
//!
//! Every operation takes the caller's `tenant_id` and constrains the query by
//! it; there is no way to read, update, delete or list a row owned by another
//! tenant through this API.
//!
//! - [`cursor`]: opaque keyset cursors over `(created_at, id)`
//! - [`filter`]: declarative filters, ordering and page types
//! - [`memory`]: in-memory implementation for tests and local development
//! - [`postgres`]: SeaORM implementation (requires the `postgres` feature)

pub mod cursor;
pub mod entity;
pub mod error;
pub mod filter;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use cursor::CursorPosition;
pub use entity::{EntityMeta, TenantEntity, now_utc};
pub use error::{RepositoryError, RepositoryResult};
pub use filter::{
    DEFAULT_PAGE_SIZE, FilterValue, Filters, ListQuery, MAX_PAGE_SIZE, OrderBy, Page, Predicate,
    SortDirection,
};
pub use memory::InMemoryTenantRepository;
#[cfg(feature = "postgres")]
pub use postgres::{MetaColumns, PgTenantRepository, TenantTable};

use async_trait::async_trait;
use uuid::Uuid;

/// CRUD, listing and counting for one tenant-owned entity type.
#[async_trait]
pub trait TenantRepository<T: TenantEntity>: Send + Sync {
    /// Inserts a row owned by `tenant_id` with `version = 1`.
    async fn create(&self, tenant_id: Uuid, draft: T::Draft) -> RepositoryResult<T>;

    /// `None` both when the row does not exist and when another tenant owns it.
    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> RepositoryResult<Option<T>>;

    /// Applies `changes` and bumps `version` by one.
    ///
    /// With `expected_version`, the write only happens if the stored version
    /// matches; a mismatch yields [`RepositoryError::Concurrency`]. A missing
    /// row (or one owned by another tenant) yields
    /// [`RepositoryError::NotFound`] in both modes.
    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: Option<i32>,
        changes: T::Changes,
    ) -> RepositoryResult<T>;

    /// `true` iff exactly one row was removed.
    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> RepositoryResult<bool>;

    /// Cursor-paginated listing. Fetches `limit + 1` rows to detect whether a
    /// further page exists.
    async fn list(&self, tenant_id: Uuid, query: ListQuery) -> RepositoryResult<Page<T>>;

    async fn count(&self, tenant_id: Uuid, filters: &Filters) -> RepositoryResult<u64>;

    async fn exists(&self, tenant_id: Uuid, id: Uuid) -> RepositoryResult<bool>;

    /// All-or-nothing insert of several rows.
    async fn bulk_create(&self, tenant_id: Uuid, drafts: Vec<T::Draft>) -> RepositoryResult<Vec<T>>;

    /// Inserts `draft`, or replaces the row of the same tenant whose
    /// `unique_fields` equal the draft's. The replacement bumps `version`.
    async fn upsert(
        &self,
        tenant_id: Uuid,
        unique_fields: &[&str],
        draft: T::Draft,
    ) -> RepositoryResult<T>;
}

//! Custom extractors for Axum handlers.
//!
//! - [`TenantContext`]: caller's tenant and user from request headers
//! - [`IdempotencyKey`]: the optional `Idempotency-Key` header
//! - [`ListParams`]: `filter`, `order_by`, `limit` and `cursor` query params
//! - [`UuidPath`], [`ValidatedJson`]: path and body parsing with structured errors

pub mod idempotency_key;
pub mod list_params;
pub mod tenant;
pub mod uuid_path;
pub mod validated_json;

pub use idempotency_key::{IDEMPOTENCY_KEY_HEADER, IdempotencyKey};
pub use list_params::ListParams;
pub use tenant::{TENANT_ID_HEADER, TenantContext, USER_ID_HEADER};
pub use uuid_path::UuidPath;
pub use validated_json::ValidatedJson;

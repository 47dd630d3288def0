//! Users Domain
//!
//! Tenant-scoped user administration.
//!
//! # Features
//!
//! - Email trimmed, lowercased and unique per tenant
//! - Roles `admin`, `editor`, `reader`; only admins assign roles
//! - Optimistic locking on update (`version`)
//! - Upsert by email
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Service   │  ← Normalisation, role checks
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← Tenant-scoped storage (in-memory or Postgres)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← Entity, DTOs, enums
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_users::{handlers, repository::InMemoryUserRepository, service::UserService};
//!
//! let service = UserService::new(InMemoryUserRepository::in_memory());
//! let router = handlers::router(service, idempotency_guard);
//! ```

pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;

// Re-export commonly used types
pub use error::{UserError, UserResult};
pub use handlers::UsersApiDoc;
pub use models::{CreateUser, Role, UpdateUser, UpsertUser, User, UserPage, UserResponse};
pub use repository::{
    InMemoryUserRepository, PostgresUserRepository, TenantUserRepository, UserRepository,
};
pub use service::UserService;

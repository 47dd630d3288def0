use thiserror::Error;

/// Errors raised by tenant-scoped repositories.
///
/// Every variant is recoverable by the caller. The HTTP layer maps each kind
/// to exactly one status class without inspecting the message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Entity not found")]
    NotFound,

    #[error("Duplicate entity: {0}")]
    Duplicate(String),

    #[error("Version conflict: expected version {expected}")]
    Concurrency { expected: i32 },

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Repository error: {0}")]
    Database(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(feature = "postgres")]
impl From<sea_orm::DbErr> for RepositoryError {
    /// Classifies integrity failures by the engine's constraint error code
    /// rather than by message text.
    fn from(err: sea_orm::DbErr) -> Self {
        use sea_orm::SqlErr;

        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => RepositoryError::Duplicate(detail),
            Some(SqlErr::ForeignKeyConstraintViolation(detail)) => {
                RepositoryError::ForeignKeyViolation(detail)
            }
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

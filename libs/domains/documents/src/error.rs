use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use database::repository::RepositoryError;
use thiserror::Error;
use uuid::Uuid;

use crate::models::DocumentStatus;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Document not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Cannot move document from '{from}' to '{to}'")]
    InvalidStatusTransition {
        from: DocumentStatus,
        to: DocumentStatus,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type DocumentResult<T> = Result<T, DocumentError>;

impl From<DocumentError> for AppError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::NotFound(id) => AppError::NotFound(format!("Document {} not found", id)),
            DocumentError::Validation(msg) => AppError::BadRequest(msg),
            err @ DocumentError::InvalidStatusTransition { .. } => {
                AppError::Conflict(err.to_string())
            }
            DocumentError::Repository(e) => AppError::Repository(e),
        }
    }
}

impl IntoResponse for DocumentError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

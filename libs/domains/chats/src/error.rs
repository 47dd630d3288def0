use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use database::repository::RepositoryError;
use thiserror::Error;
use upstream::UpstreamError;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ChatError {
    /// Missing, owned by another tenant, or owned by another user
    #[error("Chat not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

pub type ChatResult<T> = Result<T, ChatError>;

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::NotFound(id) => AppError::NotFound(format!("Chat {} not found", id)),
            ChatError::Validation(msg) => AppError::BadRequest(msg),
            ChatError::Upstream(e) => AppError::Upstream(e),
            ChatError::Repository(e) => AppError::Repository(e),
        }
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::time::Duration;

    #[test]
    fn test_status_per_kind() {
        let cases = [
            (ChatError::NotFound(Uuid::nil()), StatusCode::NOT_FOUND),
            (ChatError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (
                ChatError::Upstream(UpstreamError::CircuitOpen {
                    service: "llm".into(),
                    retry_after: Duration::from_secs(5),
                }),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                ChatError::Upstream(UpstreamError::Timeout {
                    service: "llm".into(),
                }),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                ChatError::Repository(RepositoryError::Concurrency { expected: 1 }),
                StatusCode::CONFLICT,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}

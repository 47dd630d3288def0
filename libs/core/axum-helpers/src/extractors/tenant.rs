//! Tenant context from request headers.
//!
//! Authentication happens in front of this service; it forwards the
//! verified tenant and user ids as headers.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::errors::AppError;

pub const TENANT_ID_HEADER: &str = "x-tenant-id";
pub const USER_ID_HEADER: &str = "x-user-id";

/// The caller's tenant and user.
///
/// Rejects with 401 when either header is missing or is not a UUID.
///
/// ```ignore
/// async fn list_chats(ctx: TenantContext, State(service): State<ChatService>) -> ... {
///     service.list(ctx.tenant_id, ctx.user_id, query).await
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
}

impl TenantContext {
    pub fn new(tenant_id: Uuid, user_id: Uuid) -> Self {
        Self { tenant_id, user_id }
    }
}

fn header_uuid(parts: &Parts, name: &str) -> Result<Uuid, AppError> {
    let raw = parts
        .headers
        .get(name)
        .ok_or_else(|| AppError::Unauthorized(format!("Missing {} header", name)))?;

    raw.to_str()
        .ok()
        .and_then(|s| Uuid::parse_str(s.trim()).ok())
        .ok_or_else(|| AppError::Unauthorized(format!("Malformed {} header", name)))
}

impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_id = header_uuid(parts, TENANT_ID_HEADER)?;
        let user_id = header_uuid(parts, USER_ID_HEADER)?;
        Ok(Self { tenant_id, user_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;

    async fn extract(headers: &[(&str, &str)]) -> Result<TenantContext, AppError> {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        TenantContext::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_reads_both_headers() {
        let tenant = Uuid::new_v4();
        let user = Uuid::new_v4();
        let ctx = extract(&[
            (TENANT_ID_HEADER, &tenant.to_string()),
            ("X-User-Id", &user.to_string()),
        ])
        .await
        .unwrap();
        assert_eq!(ctx, TenantContext::new(tenant, user));
    }

    #[tokio::test]
    async fn test_missing_header_is_unauthorized() {
        let err = extract(&[(TENANT_ID_HEADER, &Uuid::new_v4().to_string())])
            .await
            .unwrap_err();
        assert!(err.to_string().contains(USER_ID_HEADER));
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_header_is_unauthorized() {
        let err = extract(&[(TENANT_ID_HEADER, "acme"), (USER_ID_HEADER, "bob")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Malformed"));
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }
}

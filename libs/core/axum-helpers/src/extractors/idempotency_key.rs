use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::request::Parts,
};

use crate::errors::AppError;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

const MAX_KEY_LEN: usize = 255;

/// Client-chosen token that makes a write safe to retry.
///
/// Use `Option<IdempotencyKey>` for endpoints where the header is optional;
/// a present but malformed header is still rejected with 400.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyKey(pub String);

impl IdempotencyKey {
    /// 1 to 255 visible ASCII characters.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let key = raw.trim();
        if key.is_empty() || key.len() > MAX_KEY_LEN {
            return Err(AppError::BadRequest(format!(
                "Idempotency-Key must be 1 to {} characters",
                MAX_KEY_LEN
            )));
        }
        if !key.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(AppError::BadRequest(
                "Idempotency-Key must be visible ASCII".to_string(),
            ));
        }
        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> OptionalFromRequestParts<S> for IdempotencyKey
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        match parts.headers.get(IDEMPOTENCY_KEY_HEADER) {
            None => Ok(None),
            Some(value) => {
                let raw = value.to_str().map_err(|_| {
                    AppError::BadRequest("Idempotency-Key must be visible ASCII".to_string())
                })?;
                Self::parse(raw).map(Some)
            }
        }
    }
}

impl<S> FromRequestParts<S> for IdempotencyKey
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        <Self as OptionalFromRequestParts<S>>::from_request_parts(parts, state)
            .await?
            .ok_or_else(|| AppError::BadRequest("Missing Idempotency-Key header".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(v) = value {
            builder = builder.header(IDEMPOTENCY_KEY_HEADER, v);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_optional_header() {
        let mut missing = parts(None);
        let got = <IdempotencyKey as OptionalFromRequestParts<()>>::from_request_parts(&mut missing, &())
            .await
            .unwrap();
        assert!(got.is_none());

        let mut present = parts(Some(" order-42 "));
        let got = <IdempotencyKey as OptionalFromRequestParts<()>>::from_request_parts(&mut present, &())
            .await
            .unwrap();
        assert_eq!(got, Some(IdempotencyKey("order-42".to_string())));
    }

    #[tokio::test]
    async fn test_required_header() {
        let mut missing = parts(None);
        assert!(
            <IdempotencyKey as FromRequestParts<()>>::from_request_parts(&mut missing, &())
                .await
                .is_err()
        );
    }

    #[test]
    fn test_parse_rejects_bad_keys() {
        assert!(IdempotencyKey::parse("").is_err());
        assert!(IdempotencyKey::parse("has space").is_err());
        assert!(IdempotencyKey::parse(&"k".repeat(256)).is_err());
        assert!(IdempotencyKey::parse(&"k".repeat(255)).is_ok());
    }
}

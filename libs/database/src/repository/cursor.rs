//! Opaque keyset cursors.
//!
//! A cursor is the URL-safe base64 encoding of
//! `{"created_at": "<RFC 3339, microseconds>", "id": "<uuid>"}` taken from the
//! last row of a page. Decoding yields a [`CursorPosition`] whose predicate
//! selects rows strictly after that row in `(created_at DESC, id DESC)` order:
//!
//! ```text
//! created_at < :created_at OR (created_at = :created_at AND id < :id)
//! ```

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entity::EntityMeta;
use super::error::RepositoryError;

#[derive(Serialize, Deserialize)]
struct CursorPayload {
    created_at: String,
    id: String,
}

/// Decoded pagination position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorPosition {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl CursorPosition {
    pub fn from_meta(meta: &EntityMeta) -> Self {
        Self {
            created_at: meta.created_at,
            id: meta.id,
        }
    }

    /// True when a row with this `(created_at, id)` comes strictly after the
    /// cursor in `(created_at DESC, id DESC)` order.
    pub fn precedes(&self, created_at: DateTime<Utc>, id: Uuid) -> bool {
        created_at < self.created_at || (created_at == self.created_at && id < self.id)
    }
}

/// Encodes the position of `meta` as an opaque cursor. Deterministic.
pub fn encode(meta: &EntityMeta) -> String {
    encode_position(&CursorPosition::from_meta(meta))
}

pub fn encode_position(position: &CursorPosition) -> String {
    let payload = CursorPayload {
        created_at: position
            .created_at
            .to_rfc3339_opts(SecondsFormat::Micros, true),
        id: position.id.to_string(),
    };
    // Two string fields always serialize.
    let json = serde_json::to_vec(&payload).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

/// Decodes a cursor produced by [`encode`].
///
/// Fails with [`RepositoryError::InvalidCursor`] when the input is not base64,
/// not JSON, or lacks either field.
pub fn decode(cursor: &str) -> Result<CursorPosition, RepositoryError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor.trim_end_matches('='))
        .map_err(|e| RepositoryError::InvalidCursor(format!("not base64: {}", e)))?;

    let payload: CursorPayload = serde_json::from_slice(&bytes)
        .map_err(|e| RepositoryError::InvalidCursor(format!("malformed payload: {}", e)))?;

    let created_at = DateTime::parse_from_rfc3339(&payload.created_at)
        .map_err(|e| RepositoryError::InvalidCursor(format!("bad created_at: {}", e)))?
        .with_timezone(&Utc);

    let id = Uuid::parse_str(&payload.id)
        .map_err(|e| RepositoryError::InvalidCursor(format!("bad id: {}", e)))?;

    Ok(CursorPosition { created_at, id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn meta_at(secs: i64, id: Uuid) -> EntityMeta {
        let ts = Utc.timestamp_opt(secs, 123_456_000).single().unwrap();
        EntityMeta {
            id,
            tenant_id: Uuid::new_v4(),
            version: 1,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn test_encode_is_deterministic_and_url_safe() {
        let meta = meta_at(1_700_000_000, Uuid::new_v4());
        let a = encode(&meta);
        let b = encode(&meta);
        assert_eq!(a, b);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_decode_restores_position() {
        let meta = meta_at(1_700_000_000, Uuid::new_v4());
        let position = decode(&encode(&meta)).unwrap();
        assert_eq!(position.created_at, meta.created_at);
        assert_eq!(position.id, meta.id);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode("%%%not-base64%%%").unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidCursor(_)));
    }

    #[test]
    fn test_decode_rejects_non_json() {
        let cursor = URL_SAFE_NO_PAD.encode(b"hello");
        assert!(matches!(
            decode(&cursor),
            Err(RepositoryError::InvalidCursor(_))
        ));
    }

    #[test]
    fn test_decode_rejects_missing_field() {
        let cursor = URL_SAFE_NO_PAD.encode(br#"{"created_at":"2024-01-01T00:00:00Z"}"#);
        assert!(matches!(
            decode(&cursor),
            Err(RepositoryError::InvalidCursor(_))
        ));
    }

    #[test]
    fn test_decode_accepts_padded_input() {
        let meta = meta_at(1_600_000_000, Uuid::new_v4());
        let padded = format!("{}==", encode(&meta));
        assert_eq!(decode(&padded).unwrap().id, meta.id);
    }

    #[test]
    fn test_precedes_uses_id_as_tie_break() {
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);
        let meta = meta_at(1_700_000_000, high);
        let position = CursorPosition::from_meta(&meta);

        assert!(position.precedes(meta.created_at, low));
        assert!(!position.precedes(meta.created_at, high));
        assert!(position.precedes(meta.created_at - chrono::Duration::seconds(1), high));
        assert!(!position.precedes(meta.created_at + chrono::Duration::seconds(1), low));
    }
}

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Columns every tenant-owned row carries.
///
/// Domain types embed this with `#[serde(flatten)]` so filters and ordering
/// can address `id`, `tenant_id`, `version`, `created_at` and `updated_at`
/// the same way they address domain fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntityMeta {
    /// Metadata for a row about to be inserted: fresh v7 id, version 1.
    pub fn new(tenant_id: Uuid) -> Self {
        let now = now_utc();
        Self {
            id: Uuid::now_v7(),
            tenant_id,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Metadata after a successful mutation.
    pub fn bumped(&self) -> Self {
        Self {
            version: self.version + 1,
            updated_at: now_utc(),
            ..self.clone()
        }
    }
}

/// Current time truncated to the microsecond precision Postgres stores, so
/// cursors built from in-memory and persisted rows compare identically.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// A row owned by exactly one tenant.
pub trait TenantEntity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Fields supplied on creation (everything except [`EntityMeta`]).
    type Draft: Clone + Send + Sync + Serialize + 'static;

    /// Partial update; `None` fields are left untouched.
    type Changes: Clone + Send + Sync + 'static;

    fn meta(&self) -> &EntityMeta;

    fn meta_mut(&mut self) -> &mut EntityMeta;

    fn from_draft(meta: EntityMeta, draft: Self::Draft) -> Self;

    fn apply_changes(&mut self, changes: Self::Changes);

    fn id(&self) -> Uuid {
        self.meta().id
    }

    fn tenant_id(&self) -> Uuid {
        self.meta().tenant_id
    }

    fn version(&self) -> i32 {
        self.meta().version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_meta_starts_at_version_one() {
        let tenant = Uuid::new_v4();
        let meta = EntityMeta::new(tenant);
        assert_eq!(meta.version, 1);
        assert_eq!(meta.tenant_id, tenant);
        assert_eq!(meta.created_at, meta.updated_at);
    }

    #[test]
    fn test_bumped_increments_version_and_keeps_identity() {
        let meta = EntityMeta::new(Uuid::new_v4());
        let next = meta.bumped();
        assert_eq!(next.version, 2);
        assert_eq!(next.id, meta.id);
        assert_eq!(next.tenant_id, meta.tenant_id);
        assert_eq!(next.created_at, meta.created_at);
        assert!(next.updated_at >= meta.updated_at);
    }

    #[test]
    fn test_now_utc_has_microsecond_precision() {
        let now = now_utc();
        assert_eq!(now.timestamp_subsec_nanos() % 1_000, 0);
    }
}

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::cursor;
use super::entity::{EntityMeta, TenantEntity};
use super::error::{RepositoryError, RepositoryResult};
use super::filter::{Filters, ListQuery, OrderBy, Page, SortDirection, compare_json_values};
use super::TenantRepository;

/// In-memory tenant repository for tests and local development.
///
/// Unique constraints can be declared with [`with_unique`](Self::with_unique);
/// they are enforced per tenant like the `(tenant_id, ...)` unique indexes in
/// Postgres. Foreign keys are not modelled.
pub struct InMemoryTenantRepository<T> {
    rows: Arc<RwLock<HashMap<Uuid, T>>>,
    unique_keys: Vec<Vec<String>>,
}

impl<T> Clone for InMemoryTenantRepository<T> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            unique_keys: self.unique_keys.clone(),
        }
    }
}

impl<T: TenantEntity> Default for InMemoryTenantRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn to_json<S: Serialize>(value: &S) -> RepositoryResult<Value> {
    serde_json::to_value(value).map_err(|e| RepositoryError::Database(e.to_string()))
}

fn field_values(json: &Value, fields: &[String]) -> Vec<Value> {
    fields
        .iter()
        .map(|f| json.get(f).cloned().unwrap_or(Value::Null))
        .collect()
}

impl<T: TenantEntity> InMemoryTenantRepository<T> {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
            unique_keys: Vec::new(),
        }
    }

    /// Declares a per-tenant unique constraint over `fields`.
    pub fn with_unique(mut self, fields: &[&str]) -> Self {
        self.unique_keys
            .push(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    /// Rejects `candidate` if it collides with a row of the same tenant on
    /// any declared unique key. `pending` holds rows of the current batch
    /// that are not yet in the map.
    fn check_unique(
        &self,
        rows: &HashMap<Uuid, T>,
        pending: &[T],
        candidate: &T,
    ) -> RepositoryResult<()> {
        if self.unique_keys.is_empty() {
            return Ok(());
        }
        let candidate_json = to_json(candidate)?;

        for key in &self.unique_keys {
            let wanted = field_values(&candidate_json, key);
            if wanted.iter().all(Value::is_null) {
                continue;
            }
            for other in rows.values().chain(pending.iter()) {
                if other.id() == candidate.id() || other.tenant_id() != candidate.tenant_id() {
                    continue;
                }
                if field_values(&to_json(other)?, key) == wanted {
                    return Err(RepositoryError::Duplicate(format!(
                        "({}) already exists",
                        key.join(", ")
                    )));
                }
            }
        }
        Ok(())
    }

    fn sort(rows: &mut [(Value, T)], order: &[OrderBy]) {
        rows.sort_by(|(a, _), (b, _)| {
            for term in order {
                let left = a.get(&term.field).unwrap_or(&Value::Null);
                let right = b.get(&term.field).unwrap_or(&Value::Null);
                let ordering = match term.direction {
                    SortDirection::Asc => compare_json_values(left, right),
                    SortDirection::Desc => compare_json_values(right, left),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }

    /// Number of stored rows across all tenants.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl<T: TenantEntity> TenantRepository<T> for InMemoryTenantRepository<T> {
    async fn create(&self, tenant_id: Uuid, draft: T::Draft) -> RepositoryResult<T> {
        let entity = T::from_draft(EntityMeta::new(tenant_id), draft);

        let mut rows = self.rows.write().await;
        self.check_unique(&rows, &[], &entity)?;
        rows.insert(entity.id(), entity.clone());

        tracing::debug!(tenant_id = %tenant_id, id = %entity.id(), "Inserted row");
        Ok(entity)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> RepositoryResult<Option<T>> {
        let rows = self.rows.read().await;
        Ok(rows
            .get(&id)
            .filter(|row| row.tenant_id() == tenant_id)
            .cloned())
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: Option<i32>,
        changes: T::Changes,
    ) -> RepositoryResult<T> {
        let mut rows = self.rows.write().await;

        let current = rows
            .get(&id)
            .filter(|row| row.tenant_id() == tenant_id)
            .ok_or(RepositoryError::NotFound)?;

        if let Some(expected) = expected_version
            && current.version() != expected
        {
            return Err(RepositoryError::Concurrency { expected });
        }

        let mut updated = current.clone();
        updated.apply_changes(changes);
        *updated.meta_mut() = current.meta().bumped();
        self.check_unique(&rows, &[], &updated)?;
        rows.insert(id, updated.clone());

        tracing::debug!(tenant_id = %tenant_id, id = %id, version = updated.version(), "Updated row");
        Ok(updated)
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> RepositoryResult<bool> {
        let mut rows = self.rows.write().await;
        let owned = rows.get(&id).is_some_and(|row| row.tenant_id() == tenant_id);
        if owned {
            rows.remove(&id);
        }
        Ok(owned)
    }

    async fn list(&self, tenant_id: Uuid, query: ListQuery) -> RepositoryResult<Page<T>> {
        let position = match &query.cursor {
            Some(_) if !query.uses_default_order() => {
                return Err(RepositoryError::InvalidCursor(
                    "cursors require the default ordering".to_string(),
                ));
            }
            Some(raw) => Some(cursor::decode(raw)?),
            None => None,
        };
        let limit = query.effective_limit() as usize;

        let mut matching = Vec::new();
        {
            let rows = self.rows.read().await;
            for row in rows.values().filter(|row| row.tenant_id() == tenant_id) {
                if let Some(position) = &position
                    && !position.precedes(row.meta().created_at, row.id())
                {
                    continue;
                }
                let json = to_json(row)?;
                if query.filters.matches(&json) {
                    matching.push((json, row.clone()));
                }
            }
        }

        Self::sort(&mut matching, &query.effective_order());
        matching.truncate(limit + 1);

        let has_more = matching.len() > limit;
        matching.truncate(limit);
        let items: Vec<T> = matching.into_iter().map(|(_, row)| row).collect();

        let next_cursor = match items.last() {
            Some(last) if has_more && query.uses_default_order() => {
                Some(cursor::encode(last.meta()))
            }
            _ => None,
        };

        Ok(Page {
            items,
            next_cursor,
            has_more,
        })
    }

    async fn count(&self, tenant_id: Uuid, filters: &Filters) -> RepositoryResult<u64> {
        let rows = self.rows.read().await;
        let mut total = 0;
        for row in rows.values().filter(|row| row.tenant_id() == tenant_id) {
            if filters.matches(&to_json(row)?) {
                total += 1;
            }
        }
        Ok(total)
    }

    async fn exists(&self, tenant_id: Uuid, id: Uuid) -> RepositoryResult<bool> {
        Ok(self.get_by_id(tenant_id, id).await?.is_some())
    }

    async fn bulk_create(&self, tenant_id: Uuid, drafts: Vec<T::Draft>) -> RepositoryResult<Vec<T>> {
        let mut rows = self.rows.write().await;

        let mut batch: Vec<T> = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let entity = T::from_draft(EntityMeta::new(tenant_id), draft);
            self.check_unique(&rows, &batch, &entity)?;
            batch.push(entity);
        }

        for entity in &batch {
            rows.insert(entity.id(), entity.clone());
        }

        tracing::debug!(tenant_id = %tenant_id, count = batch.len(), "Inserted batch");
        Ok(batch)
    }

    async fn upsert(
        &self,
        tenant_id: Uuid,
        unique_fields: &[&str],
        draft: T::Draft,
    ) -> RepositoryResult<T> {
        if unique_fields.is_empty() {
            return Err(RepositoryError::InvalidFilter(
                "upsert requires at least one unique field".to_string(),
            ));
        }
        let keys: Vec<String> = unique_fields.iter().map(|f| f.to_string()).collect();
        let wanted = field_values(&to_json(&draft)?, &keys);

        // Lookup and write happen under one lock.
        let mut rows = self.rows.write().await;

        let mut existing: Option<EntityMeta> = None;
        for row in rows.values().filter(|row| row.tenant_id() == tenant_id) {
            if field_values(&to_json(row)?, &keys) == wanted {
                existing = Some(row.meta().clone());
                break;
            }
        }

        let entity = match existing {
            Some(meta) => T::from_draft(meta.bumped(), draft),
            None => T::from_draft(EntityMeta::new(tenant_id), draft),
        };
        self.check_unique(&rows, &[], &entity)?;
        rows.insert(entity.id(), entity.clone());

        tracing::debug!(tenant_id = %tenant_id, id = %entity.id(), version = entity.version(), "Upserted row");
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::filter::{FilterValue, Predicate};
    use serde::Deserialize;
    use std::collections::HashSet;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Note {
        #[serde(flatten)]
        meta: EntityMeta,
        title: String,
        priority: i64,
    }

    #[derive(Debug, Clone, Serialize)]
    struct NewNote {
        title: String,
        priority: i64,
    }

    #[derive(Debug, Clone, Default)]
    struct NoteChanges {
        title: Option<String>,
        priority: Option<i64>,
    }

    impl TenantEntity for Note {
        type Draft = NewNote;
        type Changes = NoteChanges;

        fn meta(&self) -> &EntityMeta {
            &self.meta
        }

        fn meta_mut(&mut self) -> &mut EntityMeta {
            &mut self.meta
        }

        fn from_draft(meta: EntityMeta, draft: NewNote) -> Self {
            Self {
                meta,
                title: draft.title,
                priority: draft.priority,
            }
        }

        fn apply_changes(&mut self, changes: NoteChanges) {
            if let Some(title) = changes.title {
                self.title = title;
            }
            if let Some(priority) = changes.priority {
                self.priority = priority;
            }
        }
    }

    fn note(title: &str, priority: i64) -> NewNote {
        NewNote {
            title: title.to_string(),
            priority,
        }
    }

    fn rename(title: &str) -> NoteChanges {
        NoteChanges {
            title: Some(title.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_sets_tenant_and_version() {
        let repo = InMemoryTenantRepository::<Note>::new();
        let tenant = Uuid::new_v4();

        let created = repo.create(tenant, note("first", 1)).await.unwrap();

        assert_eq!(created.meta.tenant_id, tenant);
        assert_eq!(created.meta.version, 1);
        assert_eq!(repo.get_by_id(tenant, created.meta.id).await.unwrap(), Some(created));
    }

    #[tokio::test]
    async fn test_tenant_isolation() {
        let repo = InMemoryTenantRepository::<Note>::new();
        let (t1, t2) = (Uuid::new_v4(), Uuid::new_v4());
        let created = repo.create(t1, note("secret", 1)).await.unwrap();
        let id = created.meta.id;

        assert_eq!(repo.get_by_id(t2, id).await.unwrap(), None);
        assert!(!repo.exists(t2, id).await.unwrap());
        assert!(repo.list(t2, ListQuery::new()).await.unwrap().items.is_empty());
        assert_eq!(repo.count(t2, &Filters::new()).await.unwrap(), 0);
        assert_eq!(
            repo.update(t2, id, None, rename("x")).await.unwrap_err(),
            RepositoryError::NotFound
        );
        assert_eq!(
            repo.update(t2, id, Some(1), rename("x")).await.unwrap_err(),
            RepositoryError::NotFound
        );
        assert!(!repo.delete(t2, id).await.unwrap());

        // Untouched for the owner.
        let owned = repo.get_by_id(t1, id).await.unwrap().unwrap();
        assert_eq!(owned.title, "secret");
        assert_eq!(owned.meta.version, 1);
    }

    #[tokio::test]
    async fn test_tenant_filter_does_not_escape_scope() {
        let repo = InMemoryTenantRepository::<Note>::new();
        let (t1, t2) = (Uuid::new_v4(), Uuid::new_v4());
        repo.create(t1, note("mine", 1)).await.unwrap();
        repo.create(t2, note("theirs", 1)).await.unwrap();

        let filters = Filters::new().eq("tenant_id", FilterValue::Uuid(t2));
        let page = repo
            .list(t1, ListQuery::new().with_filters(filters))
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].title, "mine");
    }

    #[tokio::test]
    async fn test_optimistic_lock() {
        let repo = InMemoryTenantRepository::<Note>::new();
        let tenant = Uuid::new_v4();
        let id = repo.create(tenant, note("v1", 1)).await.unwrap().meta.id;

        let updated = repo.update(tenant, id, Some(1), rename("v2")).await.unwrap();
        assert_eq!(updated.meta.version, 2);

        let stale = repo.update(tenant, id, Some(1), rename("stale")).await;
        assert_eq!(stale.unwrap_err(), RepositoryError::Concurrency { expected: 1 });

        let current = repo.get_by_id(tenant, id).await.unwrap().unwrap();
        assert_eq!(current.title, "v2");

        let third = repo.update(tenant, id, Some(2), rename("v3")).await.unwrap();
        assert_eq!(third.meta.version, 3);
        assert_eq!(third.title, "v3");
    }

    #[tokio::test]
    async fn test_update_without_version_on_missing_row() {
        let repo = InMemoryTenantRepository::<Note>::new();
        let result = repo
            .update(Uuid::new_v4(), Uuid::new_v4(), None, rename("x"))
            .await;
        assert_eq!(result.unwrap_err(), RepositoryError::NotFound);
    }

    #[tokio::test]
    async fn test_update_refreshes_updated_at_only() {
        let repo = InMemoryTenantRepository::<Note>::new();
        let tenant = Uuid::new_v4();
        let created = repo.create(tenant, note("a", 1)).await.unwrap();

        let updated = repo
            .update(tenant, created.meta.id, None, rename("b"))
            .await
            .unwrap();

        assert_eq!(updated.meta.created_at, created.meta.created_at);
        assert!(updated.meta.updated_at >= created.meta.updated_at);
        assert_eq!(updated.priority, 1);
    }

    #[tokio::test]
    async fn test_delete_returns_true_once() {
        let repo = InMemoryTenantRepository::<Note>::new();
        let tenant = Uuid::new_v4();
        let id = repo.create(tenant, note("gone", 1)).await.unwrap().meta.id;

        assert!(repo.delete(tenant, id).await.unwrap());
        assert!(!repo.delete(tenant, id).await.unwrap());
        assert!(repo.is_empty().await);
    }

    #[tokio::test]
    async fn test_cursor_pagination_is_stable_under_inserts() {
        let repo = InMemoryTenantRepository::<Note>::new();
        let tenant = Uuid::new_v4();

        let mut created = Vec::new();
        for i in 0..10 {
            created.push(repo.create(tenant, note(&format!("n{}", i), i)).await.unwrap());
        }
        created.sort_by(|a, b| {
            (b.meta.created_at, b.meta.id).cmp(&(a.meta.created_at, a.meta.id))
        });

        let mut seen = Vec::new();
        let mut cursor = None;
        for page_no in 0..3 {
            let page = repo
                .list(tenant, ListQuery::new().with_limit(3).with_cursor(cursor.clone()))
                .await
                .unwrap();
            assert_eq!(page.items.len(), 3);
            assert!(page.has_more);
            seen.extend(page.items.iter().map(|n| n.meta.id));
            cursor = page.next_cursor;
            assert!(cursor.is_some());

            if page_no == 0 {
                repo.create(tenant, note("late arrival", 99)).await.unwrap();
            }
        }

        let expected: Vec<Uuid> = created.iter().take(9).map(|n| n.meta.id).collect();
        assert_eq!(seen, expected);
        assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 9);

        let last = repo
            .list(tenant, ListQuery::new().with_limit(3).with_cursor(cursor))
            .await
            .unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].meta.id, created[9].meta.id);
        assert!(!last.has_more);
        assert!(last.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_cursor_excludes_its_own_row() {
        let repo = InMemoryTenantRepository::<Note>::new();
        let tenant = Uuid::new_v4();
        for i in 0..4 {
            repo.create(tenant, note("n", i)).await.unwrap();
        }

        let first = repo
            .list(tenant, ListQuery::new().with_limit(1))
            .await
            .unwrap();
        let boundary = first.items[0].meta.id;
        let rest = repo
            .list(tenant, ListQuery::new().with_cursor(first.next_cursor))
            .await
            .unwrap();

        assert_eq!(rest.items.len(), 3);
        assert!(rest.items.iter().all(|n| n.meta.id != boundary));
    }

    #[tokio::test]
    async fn test_explicit_created_at_desc_pages_with_cursor() {
        let repo = InMemoryTenantRepository::<Note>::new();
        let tenant = Uuid::new_v4();
        for i in 0..3 {
            repo.create(tenant, note("n", i)).await.unwrap();
        }
        let query = || ListQuery::new().with_order(vec![OrderBy::desc("created_at")]).with_limit(2);

        let first = repo.list(tenant, query()).await.unwrap();
        assert!(first.has_more);
        assert!(first.next_cursor.is_some());

        let rest = repo
            .list(tenant, query().with_cursor(first.next_cursor))
            .await
            .unwrap();
        assert_eq!(rest.items.len(), 1);
        assert!(!rest.has_more);
    }

    #[tokio::test]
    async fn test_invalid_cursor_is_rejected() {
        let repo = InMemoryTenantRepository::<Note>::new();
        let result = repo
            .list(
                Uuid::new_v4(),
                ListQuery::new().with_cursor(Some("not a cursor".to_string())),
            )
            .await;
        assert!(matches!(result, Err(RepositoryError::InvalidCursor(_))));
    }

    #[tokio::test]
    async fn test_cursor_with_custom_order_is_rejected() {
        let repo = InMemoryTenantRepository::<Note>::new();
        let tenant = Uuid::new_v4();
        let created = repo.create(tenant, note("a", 1)).await.unwrap();
        let query = ListQuery::new()
            .with_order(vec![OrderBy::asc("title")])
            .with_cursor(Some(cursor::encode(&created.meta)));

        assert!(matches!(
            repo.list(tenant, query).await,
            Err(RepositoryError::InvalidCursor(_))
        ));
    }

    #[tokio::test]
    async fn test_list_filters_and_custom_order() {
        let repo = InMemoryTenantRepository::<Note>::new();
        let tenant = Uuid::new_v4();
        for (title, priority) in [("c", 3), ("a", 1), ("b", 2), ("z", 10)] {
            repo.create(tenant, note(title, priority)).await.unwrap();
        }

        let filters = Filters::new().with("priority", Predicate::Lt(FilterValue::Int(5)));
        let page = repo
            .list(
                tenant,
                ListQuery::new()
                    .with_filters(filters.clone())
                    .with_order(vec![OrderBy::asc("title")])
                    .with_limit(2),
            )
            .await
            .unwrap();

        let titles: Vec<_> = page.items.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b"]);
        assert!(page.has_more);
        assert!(page.next_cursor.is_none());
        assert_eq!(repo.count(tenant, &filters).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_unique_constraint_maps_to_duplicate() {
        let repo = InMemoryTenantRepository::<Note>::new().with_unique(&["title"]);
        let (t1, t2) = (Uuid::new_v4(), Uuid::new_v4());

        repo.create(t1, note("same", 1)).await.unwrap();
        let dup = repo.create(t1, note("same", 2)).await;
        assert!(matches!(dup, Err(RepositoryError::Duplicate(_))));

        // Scoped per tenant.
        assert!(repo.create(t2, note("same", 1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_bulk_create_is_all_or_nothing() {
        let repo = InMemoryTenantRepository::<Note>::new().with_unique(&["title"]);
        let tenant = Uuid::new_v4();

        let result = repo
            .bulk_create(tenant, vec![note("a", 1), note("b", 2), note("a", 3)])
            .await;
        assert!(matches!(result, Err(RepositoryError::Duplicate(_))));
        assert!(repo.is_empty().await);

        let rows = repo
            .bulk_create(tenant, vec![note("a", 1), note("b", 2)])
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|n| n.meta.tenant_id == tenant));
        assert_eq!(repo.len().await, 2);
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_updates_in_place() {
        let repo = InMemoryTenantRepository::<Note>::new();
        let tenant = Uuid::new_v4();

        let inserted = repo.upsert(tenant, &["title"], note("daily", 1)).await.unwrap();
        assert_eq!(inserted.meta.version, 1);

        let updated = repo.upsert(tenant, &["title"], note("daily", 5)).await.unwrap();
        assert_eq!(updated.meta.id, inserted.meta.id);
        assert_eq!(updated.meta.version, 2);
        assert_eq!(updated.priority, 5);
        assert_eq!(repo.len().await, 1);

        // Same key under another tenant is a separate row.
        let other = repo
            .upsert(Uuid::new_v4(), &["title"], note("daily", 1))
            .await
            .unwrap();
        assert_ne!(other.meta.id, inserted.meta.id);
    }

    #[tokio::test]
    async fn test_upsert_requires_unique_fields() {
        let repo = InMemoryTenantRepository::<Note>::new();
        let result = repo.upsert(Uuid::new_v4(), &[], note("x", 1)).await;
        assert!(matches!(result, Err(RepositoryError::InvalidFilter(_))));
    }
}

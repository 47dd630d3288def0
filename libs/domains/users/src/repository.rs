use async_trait::async_trait;
use database::repository::{
    FilterValue, Filters, InMemoryTenantRepository, ListQuery, Page, RepositoryError,
    TenantRepository,
};
use uuid::Uuid;

use crate::error::{UserError, UserResult};
use crate::models::{NewUser, User, UserChanges};

/// Repository trait for User persistence
///
/// Every method is scoped by `tenant_id`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, tenant_id: Uuid, user: NewUser) -> UserResult<User>;

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> UserResult<Option<User>>;

    /// `email` must already be normalised
    async fn get_by_email(&self, tenant_id: Uuid, email: &str) -> UserResult<Option<User>>;

    async fn list(&self, tenant_id: Uuid, query: ListQuery) -> UserResult<Page<User>>;

    async fn count(&self, tenant_id: Uuid, filters: Filters) -> UserResult<u64>;

    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: i32,
        changes: UserChanges,
    ) -> UserResult<User>;

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> UserResult<bool>;

    /// Insert or replace the user with the same email.
    async fn upsert_by_email(&self, tenant_id: Uuid, user: NewUser) -> UserResult<User>;
}

/// [`UserRepository`] over any tenant repository of users.
#[derive(Clone)]
pub struct TenantUserRepository<R> {
    inner: R,
}

/// In-memory users for development and tests
pub type InMemoryUserRepository = TenantUserRepository<InMemoryTenantRepository<User>>;

/// PostgreSQL users table
pub type PostgresUserRepository =
    TenantUserRepository<database::repository::PgTenantRepository<crate::entity::Entity>>;

impl<R> TenantUserRepository<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl InMemoryUserRepository {
    /// Enforces the per-tenant email uniqueness of the users table.
    pub fn in_memory() -> Self {
        Self::new(InMemoryTenantRepository::new().with_unique(&["email"]))
    }
}

impl PostgresUserRepository {
    pub fn postgres(db: sea_orm::DatabaseConnection) -> Self {
        Self::new(database::repository::PgTenantRepository::new(db))
    }
}

fn duplicate_email(email: &str) -> impl FnOnce(RepositoryError) -> UserError + '_ {
    move |err| match err {
        RepositoryError::Duplicate(_) => UserError::DuplicateEmail(email.to_string()),
        other => other.into(),
    }
}

#[async_trait]
impl<R> UserRepository for TenantUserRepository<R>
where
    R: TenantRepository<User>,
{
    async fn create(&self, tenant_id: Uuid, user: NewUser) -> UserResult<User> {
        let email = user.email.clone();
        let created = self
            .inner
            .create(tenant_id, user)
            .await
            .map_err(duplicate_email(&email))?;

        tracing::debug!(tenant_id = %tenant_id, user_id = %created.meta.id, "Inserted user");
        Ok(created)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> UserResult<Option<User>> {
        Ok(self.inner.get_by_id(tenant_id, id).await?)
    }

    async fn get_by_email(&self, tenant_id: Uuid, email: &str) -> UserResult<Option<User>> {
        let query = ListQuery::new()
            .with_filters(Filters::new().eq("email", FilterValue::String(email.to_string())))
            .with_limit(1);
        let page = self.inner.list(tenant_id, query).await?;
        Ok(page.items.into_iter().next())
    }

    async fn list(&self, tenant_id: Uuid, query: ListQuery) -> UserResult<Page<User>> {
        Ok(self.inner.list(tenant_id, query).await?)
    }

    async fn count(&self, tenant_id: Uuid, filters: Filters) -> UserResult<u64> {
        Ok(self.inner.count(tenant_id, &filters).await?)
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: i32,
        changes: UserChanges,
    ) -> UserResult<User> {
        let email = changes.email.clone().unwrap_or_default();
        let updated = self
            .inner
            .update(tenant_id, id, Some(expected_version), changes)
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound => UserError::NotFound(id),
                other => duplicate_email(&email)(other),
            })?;

        tracing::debug!(tenant_id = %tenant_id, user_id = %id, version = updated.meta.version, "Updated user");
        Ok(updated)
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> UserResult<bool> {
        Ok(self.inner.delete(tenant_id, id).await?)
    }

    async fn upsert_by_email(&self, tenant_id: Uuid, user: NewUser) -> UserResult<User> {
        Ok(self.inner.upsert(tenant_id, &["email"], user).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn new_user(email: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            display_name: "Test User".to_string(),
            role: Role::Reader,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = InMemoryUserRepository::in_memory();
        let tenant = Uuid::new_v4();

        let created = repo.create(tenant, new_user("test@example.com")).await.unwrap();
        assert_eq!(created.meta.version, 1);

        let fetched = repo.get_by_id(tenant, created.meta.id).await.unwrap();
        assert_eq!(fetched.unwrap().email, "test@example.com");

        let by_email = repo.get_by_email(tenant, "test@example.com").await.unwrap();
        assert_eq!(by_email.unwrap().meta.id, created.meta.id);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_per_tenant() {
        let repo = InMemoryUserRepository::in_memory();
        let tenant = Uuid::new_v4();

        repo.create(tenant, new_user("test@example.com")).await.unwrap();
        let result = repo.create(tenant, new_user("test@example.com")).await;
        assert!(matches!(result, Err(UserError::DuplicateEmail(e)) if e == "test@example.com"));

        // Another tenant may reuse the address
        assert!(repo.create(Uuid::new_v4(), new_user("test@example.com")).await.is_ok());
    }

    #[tokio::test]
    async fn test_other_tenant_cannot_see_or_update() {
        let repo = InMemoryUserRepository::in_memory();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let user = repo.create(owner, new_user("a@example.com")).await.unwrap();

        assert!(repo.get_by_id(other, user.meta.id).await.unwrap().is_none());
        assert!(repo.get_by_email(other, "a@example.com").await.unwrap().is_none());
        let result = repo
            .update(other, user.meta.id, 1, UserChanges::default())
            .await;
        assert!(matches!(result, Err(UserError::NotFound(_))));
        assert!(!repo.delete(other, user.meta.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_stale_version_is_a_conflict() {
        let repo = InMemoryUserRepository::in_memory();
        let tenant = Uuid::new_v4();
        let user = repo.create(tenant, new_user("a@example.com")).await.unwrap();

        let changes = UserChanges {
            display_name: Some("Renamed".to_string()),
            ..Default::default()
        };
        let updated = repo.update(tenant, user.meta.id, 1, changes.clone()).await.unwrap();
        assert_eq!(updated.meta.version, 2);

        let stale = repo.update(tenant, user.meta.id, 1, changes).await;
        assert!(matches!(
            stale,
            Err(UserError::Repository(RepositoryError::Concurrency { expected: 1 }))
        ));
    }

    #[tokio::test]
    async fn test_upsert_by_email_replaces_in_place() {
        let repo = InMemoryUserRepository::in_memory();
        let tenant = Uuid::new_v4();

        let first = repo.upsert_by_email(tenant, new_user("a@example.com")).await.unwrap();
        let mut replacement = new_user("a@example.com");
        replacement.role = Role::Editor;
        let second = repo.upsert_by_email(tenant, replacement).await.unwrap();

        assert_eq!(second.meta.id, first.meta.id);
        assert_eq!(second.meta.version, 2);
        assert_eq!(second.role, Role::Editor);
        assert_eq!(repo.count(tenant, Filters::new()).await.unwrap(), 1);
    }
}

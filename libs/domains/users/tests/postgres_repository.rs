//! `PostgresUserRepository` against a migrated Postgres (requires Docker).

use database::repository::Filters;
use domain_users::models::NewUser;
use domain_users::{PostgresUserRepository, Role, UserError, UserRepository};
use test_utils::{TestDataBuilder, TestDatabase};

fn new_user(email: &str, role: Role) -> NewUser {
    NewUser {
        email: email.to_string(),
        display_name: "Test User".to_string(),
        role,
        is_active: true,
    }
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_email_is_unique_per_tenant() {
    let db = TestDatabase::new().await;
    let repo = PostgresUserRepository::postgres(db.connection());
    let builder = TestDataBuilder::from_test_name("pg_users_unique");

    repo.create(builder.tenant_id(), new_user("ada@example.com", Role::Reader))
        .await
        .unwrap();
    let duplicate = repo
        .create(builder.tenant_id(), new_user("ada@example.com", Role::Reader))
        .await;
    assert!(matches!(duplicate, Err(UserError::DuplicateEmail(_))));

    repo.create(builder.other_tenant_id(), new_user("ada@example.com", Role::Reader))
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_upsert_by_email_bumps_version_in_place() {
    let db = TestDatabase::new().await;
    let repo = PostgresUserRepository::postgres(db.connection());
    let builder = TestDataBuilder::from_test_name("pg_users_upsert");
    let tenant = builder.tenant_id();

    let first = repo
        .upsert_by_email(tenant, new_user("ada@example.com", Role::Reader))
        .await
        .unwrap();
    let second = repo
        .upsert_by_email(tenant, new_user("ada@example.com", Role::Editor))
        .await
        .unwrap();

    assert_eq!(second.meta.id, first.meta.id);
    assert_eq!(second.meta.version, 2);
    assert_eq!(second.role, Role::Editor);
    assert_eq!(repo.count(tenant, Filters::new()).await.unwrap(), 1);

    let found = repo.get_by_email(tenant, "ada@example.com").await.unwrap();
    assert_eq!(found.map(|u| u.meta.id), Some(first.meta.id));
}

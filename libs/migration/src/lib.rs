pub use sea_orm_migration::prelude::*;

mod m20261001_000001_create_users;
mod m20261001_000002_create_chats;
mod m20261001_000003_create_messages;
mod m20261001_000004_create_documents;
mod m20261001_000005_create_idempotency_keys;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261001_000001_create_users::Migration),
            Box::new(m20261001_000002_create_chats::Migration),
            Box::new(m20261001_000003_create_messages::Migration),
            Box::new(m20261001_000004_create_documents::Migration),
            Box::new(m20261001_000005_create_idempotency_keys::Migration),
        ]
    }
}

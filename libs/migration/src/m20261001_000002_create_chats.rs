use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Chats::Table)
                    .if_not_exists()
                    .col(pk_uuid(Chats::Id))
                    .col(uuid(Chats::TenantId))
                    .col(uuid(Chats::OwnerId))
                    .col(string(Chats::Name))
                    .col(json_binary(Chats::Tags).default("[]"))
                    .col(integer(Chats::Version).default(1))
                    .col(
                        timestamp_with_time_zone(Chats::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Chats::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_chats_tenant_created")
                    .table(Chats::Table)
                    .col(Chats::TenantId)
                    .col(Chats::CreatedAt)
                    .col(Chats::Id)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_chats_tenant_owner")
                    .table(Chats::Table)
                    .col(Chats::TenantId)
                    .col(Chats::OwnerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Chats::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum Chats {
    Table,
    Id,
    TenantId,
    OwnerId,
    Name,
    Tags,
    Version,
    CreatedAt,
    UpdatedAt,
}

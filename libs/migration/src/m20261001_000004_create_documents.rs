use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Documents::Table)
                    .if_not_exists()
                    .col(pk_uuid(Documents::Id))
                    .col(uuid(Documents::TenantId))
                    .col(uuid(Documents::UploadedBy))
                    .col(string(Documents::Title))
                    .col(string(Documents::Filename))
                    .col(string_len(Documents::ContentType, 127))
                    .col(big_integer(Documents::SizeBytes).default(0))
                    .col(string_len(Documents::Status, 16).default("uploaded"))
                    .col(json_binary(Documents::Tags).default("[]"))
                    .col(text_null(Documents::ErrorMessage))
                    .col(integer(Documents::Version).default(1))
                    .col(
                        timestamp_with_time_zone(Documents::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Documents::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_documents_tenant_created")
                    .table(Documents::Table)
                    .col(Documents::TenantId)
                    .col(Documents::CreatedAt)
                    .col(Documents::Id)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_documents_tenant_status")
                    .table(Documents::Table)
                    .col(Documents::TenantId)
                    .col(Documents::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Documents::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Documents {
    Table,
    Id,
    TenantId,
    UploadedBy,
    Title,
    Filename,
    ContentType,
    SizeBytes,
    Status,
    Tags,
    ErrorMessage,
    Version,
    CreatedAt,
    UpdatedAt,
}

use database::repository::{EntityMeta, MetaColumns, RepositoryError, RepositoryResult, TenantTable};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

use crate::models::{Chat, ChatChanges, NewChat};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "chats")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    /// JSON array of normalised tags
    #[sea_orm(column_type = "JsonBinary")]
    pub tags: Json,
    pub version: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::message::Entity")]
    Messages,
}

impl Related<super::message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

fn tags_to_json(tags: Vec<String>) -> Json {
    Json::Array(tags.into_iter().map(Json::String).collect())
}

impl TenantTable for Entity {
    type Domain = Chat;

    fn meta_columns() -> MetaColumns<Column> {
        MetaColumns {
            id: Column::Id,
            tenant_id: Column::TenantId,
            version: Column::Version,
            created_at: Column::CreatedAt,
            updated_at: Column::UpdatedAt,
        }
    }

    fn into_domain(model: Model) -> RepositoryResult<Chat> {
        let tags: Vec<String> = serde_json::from_value(model.tags)
            .map_err(|e| RepositoryError::Database(format!("malformed chat tags: {}", e)))?;

        Ok(Chat {
            meta: EntityMeta {
                id: model.id,
                tenant_id: model.tenant_id,
                version: model.version,
                created_at: model.created_at,
                updated_at: model.updated_at,
            },
            owner_id: model.owner_id,
            name: model.name,
            tags,
        })
    }

    fn draft_into_active(meta: &EntityMeta, draft: NewChat) -> RepositoryResult<ActiveModel> {
        Ok(ActiveModel {
            id: Set(meta.id),
            tenant_id: Set(meta.tenant_id),
            owner_id: Set(draft.owner_id),
            name: Set(draft.name),
            tags: Set(tags_to_json(draft.tags)),
            version: Set(meta.version),
            created_at: Set(meta.created_at),
            updated_at: Set(meta.updated_at),
        })
    }

    fn changes_into_active(changes: ChatChanges) -> RepositoryResult<ActiveModel> {
        let mut active = <ActiveModel as Default>::default();
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(tags) = changes.tags {
            active.tags = Set(tags_to_json(tags));
        }
        Ok(active)
    }
}

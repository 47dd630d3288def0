use database::repository::{EntityMeta, MetaColumns, RepositoryResult, TenantTable};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

use crate::models::{Message, MessageRole, NewMessage};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub chat_id: Uuid,
    pub role: MessageRole,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub model: Option<String>,
    pub version: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::chat::Entity",
        from = "Column::ChatId",
        to = "super::chat::Column::Id",
        on_delete = "Cascade"
    )]
    Chat,
}

impl Related<super::chat::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Chat.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TenantTable for Entity {
    type Domain = Message;

    fn meta_columns() -> MetaColumns<Column> {
        MetaColumns {
            id: Column::Id,
            tenant_id: Column::TenantId,
            version: Column::Version,
            created_at: Column::CreatedAt,
            updated_at: Column::UpdatedAt,
        }
    }

    fn into_domain(model: Model) -> RepositoryResult<Message> {
        Ok(Message {
            meta: EntityMeta {
                id: model.id,
                tenant_id: model.tenant_id,
                version: model.version,
                created_at: model.created_at,
                updated_at: model.updated_at,
            },
            chat_id: model.chat_id,
            role: model.role,
            content: model.content,
            model: model.model,
        })
    }

    fn draft_into_active(meta: &EntityMeta, draft: NewMessage) -> RepositoryResult<ActiveModel> {
        Ok(ActiveModel {
            id: Set(meta.id),
            tenant_id: Set(meta.tenant_id),
            chat_id: Set(draft.chat_id),
            role: Set(draft.role),
            content: Set(draft.content),
            model: Set(draft.model),
            version: Set(meta.version),
            created_at: Set(meta.created_at),
            updated_at: Set(meta.updated_at),
        })
    }

    // Messages are append-only
    fn changes_into_active(_changes: ()) -> RepositoryResult<ActiveModel> {
        Ok(<ActiveModel as Default>::default())
    }
}

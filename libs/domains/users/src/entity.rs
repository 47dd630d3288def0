use database::repository::{EntityMeta, MetaColumns, RepositoryResult, TenantTable};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

use crate::models::{NewUser, Role, User, UserChanges};

/// Sea-ORM Entity for the users table
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub is_active: bool,
    pub version: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TenantTable for Entity {
    type Domain = User;

    fn meta_columns() -> MetaColumns<Column> {
        MetaColumns {
            id: Column::Id,
            tenant_id: Column::TenantId,
            version: Column::Version,
            created_at: Column::CreatedAt,
            updated_at: Column::UpdatedAt,
        }
    }

    fn into_domain(model: Model) -> RepositoryResult<User> {
        Ok(User {
            meta: EntityMeta {
                id: model.id,
                tenant_id: model.tenant_id,
                version: model.version,
                created_at: model.created_at,
                updated_at: model.updated_at,
            },
            email: model.email,
            display_name: model.display_name,
            role: model.role,
            is_active: model.is_active,
        })
    }

    fn draft_into_active(meta: &EntityMeta, draft: NewUser) -> RepositoryResult<ActiveModel> {
        Ok(ActiveModel {
            id: Set(meta.id),
            tenant_id: Set(meta.tenant_id),
            email: Set(draft.email),
            display_name: Set(draft.display_name),
            role: Set(draft.role),
            is_active: Set(draft.is_active),
            version: Set(meta.version),
            created_at: Set(meta.created_at),
            updated_at: Set(meta.updated_at),
        })
    }

    fn changes_into_active(changes: UserChanges) -> RepositoryResult<ActiveModel> {
        let mut active = <ActiveModel as Default>::default();
        if let Some(email) = changes.email {
            active.email = Set(email);
        }
        if let Some(display_name) = changes.display_name {
            active.display_name = Set(display_name);
        }
        if let Some(role) = changes.role {
            active.role = Set(role);
        }
        if let Some(is_active) = changes.is_active {
            active.is_active = Set(is_active);
        }
        Ok(active)
    }
}

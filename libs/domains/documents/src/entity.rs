use database::repository::{EntityMeta, MetaColumns, RepositoryError, RepositoryResult, TenantTable};
use sea_orm::ActiveValue::Set;
use sea_orm::entity::prelude::*;

use crate::models::{Document, DocumentChanges, DocumentStatus, NewDocument};

/// Sea-ORM Entity for the documents table
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "documents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub uploaded_by: Uuid,
    pub title: String,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub status: DocumentStatus,
    #[sea_orm(column_type = "JsonBinary")]
    pub tags: Json,
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub version: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TenantTable for Entity {
    type Domain = Document;

    fn meta_columns() -> MetaColumns<Column> {
        MetaColumns {
            id: Column::Id,
            tenant_id: Column::TenantId,
            version: Column::Version,
            created_at: Column::CreatedAt,
            updated_at: Column::UpdatedAt,
        }
    }

    fn into_domain(model: Model) -> RepositoryResult<Document> {
        let tags: Vec<String> = serde_json::from_value(model.tags)
            .map_err(|e| RepositoryError::Database(format!("malformed document tags: {}", e)))?;

        Ok(Document {
            meta: EntityMeta {
                id: model.id,
                tenant_id: model.tenant_id,
                version: model.version,
                created_at: model.created_at,
                updated_at: model.updated_at,
            },
            uploaded_by: model.uploaded_by,
            title: model.title,
            filename: model.filename,
            content_type: model.content_type,
            size_bytes: model.size_bytes,
            status: model.status,
            tags,
            error_message: model.error_message,
        })
    }

    fn draft_into_active(meta: &EntityMeta, draft: NewDocument) -> RepositoryResult<ActiveModel> {
        Ok(ActiveModel {
            id: Set(meta.id),
            tenant_id: Set(meta.tenant_id),
            uploaded_by: Set(draft.uploaded_by),
            title: Set(draft.title),
            filename: Set(draft.filename),
            content_type: Set(draft.content_type),
            size_bytes: Set(draft.size_bytes),
            status: Set(DocumentStatus::Uploaded),
            tags: Set(serde_json::json!(draft.tags)),
            error_message: Set(None),
            version: Set(meta.version),
            created_at: Set(meta.created_at),
            updated_at: Set(meta.updated_at),
        })
    }

    fn changes_into_active(changes: DocumentChanges) -> RepositoryResult<ActiveModel> {
        let mut active = <ActiveModel as Default>::default();
        if let Some(title) = changes.title {
            active.title = Set(title);
        }
        if let Some(tags) = changes.tags {
            active.tags = Set(serde_json::json!(tags));
        }
        if let Some(status) = changes.status {
            active.status = Set(status);
        }
        if let Some(error_message) = changes.error_message {
            active.error_message = Set(error_message);
        }
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::ActiveValue;

    #[test]
    fn test_status_change_sets_only_touched_columns() {
        let active = Entity::changes_into_active(DocumentChanges::status(
            DocumentStatus::Ready,
            None,
        ))
        .unwrap();

        assert_eq!(active.status, ActiveValue::Set(DocumentStatus::Ready));
        assert_eq!(active.error_message, ActiveValue::Set(None));
        assert!(active.title.is_not_set());
        assert!(active.tags.is_not_set());
    }

    #[test]
    fn test_draft_starts_uploaded() {
        let meta = EntityMeta::new(Uuid::new_v4());
        let active = Entity::draft_into_active(
            &meta,
            NewDocument {
                uploaded_by: Uuid::new_v4(),
                title: "Q3 report".to_string(),
                filename: "q3.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                size_bytes: 1024,
                tags: vec!["finance".to_string()],
            },
        )
        .unwrap();

        assert_eq!(active.status, ActiveValue::Set(DocumentStatus::Uploaded));
        assert_eq!(active.tags, ActiveValue::Set(serde_json::json!(["finance"])));
        assert_eq!(active.version, ActiveValue::Set(1));
    }
}

use async_trait::async_trait;
use database::repository::{
    Filters, InMemoryTenantRepository, ListQuery, Page, PgTenantRepository, RepositoryError,
    TenantRepository,
};
use uuid::Uuid;

use crate::error::{DocumentError, DocumentResult};
use crate::models::{Document, DocumentChanges, NewDocument};

/// Repository trait for Document persistence
///
/// Every method is scoped by `tenant_id`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn create(&self, tenant_id: Uuid, document: NewDocument) -> DocumentResult<Document>;

    /// Inserts all documents or none.
    async fn create_many(
        &self,
        tenant_id: Uuid,
        documents: Vec<NewDocument>,
    ) -> DocumentResult<Vec<Document>>;

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> DocumentResult<Option<Document>>;

    async fn list(&self, tenant_id: Uuid, query: ListQuery) -> DocumentResult<Page<Document>>;

    async fn count(&self, tenant_id: Uuid, filters: Filters) -> DocumentResult<u64>;

    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: i32,
        changes: DocumentChanges,
    ) -> DocumentResult<Document>;

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> DocumentResult<bool>;
}

/// [`DocumentRepository`] over any tenant repository of documents.
#[derive(Clone)]
pub struct TenantDocumentRepository<R> {
    inner: R,
}

pub type InMemoryDocumentRepository = TenantDocumentRepository<InMemoryTenantRepository<Document>>;

pub type PostgresDocumentRepository =
    TenantDocumentRepository<PgTenantRepository<crate::entity::Entity>>;

impl<R> TenantDocumentRepository<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl InMemoryDocumentRepository {
    pub fn in_memory() -> Self {
        Self::new(InMemoryTenantRepository::new())
    }
}

impl PostgresDocumentRepository {
    pub fn postgres(db: sea_orm::DatabaseConnection) -> Self {
        Self::new(PgTenantRepository::new(db))
    }
}

#[async_trait]
impl<R> DocumentRepository for TenantDocumentRepository<R>
where
    R: TenantRepository<Document>,
{
    async fn create(&self, tenant_id: Uuid, document: NewDocument) -> DocumentResult<Document> {
        let created = self.inner.create(tenant_id, document).await?;
        tracing::debug!(tenant_id = %tenant_id, document_id = %created.meta.id, "Inserted document");
        Ok(created)
    }

    async fn create_many(
        &self,
        tenant_id: Uuid,
        documents: Vec<NewDocument>,
    ) -> DocumentResult<Vec<Document>> {
        let created = self.inner.bulk_create(tenant_id, documents).await?;
        tracing::debug!(tenant_id = %tenant_id, count = created.len(), "Inserted documents");
        Ok(created)
    }

    async fn get_by_id(&self, tenant_id: Uuid, id: Uuid) -> DocumentResult<Option<Document>> {
        Ok(self.inner.get_by_id(tenant_id, id).await?)
    }

    async fn list(&self, tenant_id: Uuid, query: ListQuery) -> DocumentResult<Page<Document>> {
        Ok(self.inner.list(tenant_id, query).await?)
    }

    async fn count(&self, tenant_id: Uuid, filters: Filters) -> DocumentResult<u64> {
        Ok(self.inner.count(tenant_id, &filters).await?)
    }

    async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: i32,
        changes: DocumentChanges,
    ) -> DocumentResult<Document> {
        let updated = self
            .inner
            .update(tenant_id, id, Some(expected_version), changes)
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound => DocumentError::NotFound(id),
                other => other.into(),
            })?;

        tracing::debug!(tenant_id = %tenant_id, document_id = %id, version = updated.meta.version, "Updated document");
        Ok(updated)
    }

    async fn delete(&self, tenant_id: Uuid, id: Uuid) -> DocumentResult<bool> {
        Ok(self.inner.delete(tenant_id, id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentStatus;
    use database::repository::FilterValue;

    fn new_document(title: &str) -> NewDocument {
        NewDocument {
            uploaded_by: Uuid::new_v4(),
            title: title.to_string(),
            filename: "report.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            size_bytes: 2048,
            tags: vec![],
        }
    }

    #[tokio::test]
    async fn test_create_starts_uploaded_at_version_one() {
        let repo = InMemoryDocumentRepository::in_memory();
        let tenant = Uuid::new_v4();

        let doc = repo.create(tenant, new_document("Q3")).await.unwrap();
        assert_eq!(doc.status, DocumentStatus::Uploaded);
        assert_eq!(doc.meta.version, 1);
        assert!(doc.error_message.is_none());
    }

    #[tokio::test]
    async fn test_create_many_inserts_all() {
        let repo = InMemoryDocumentRepository::in_memory();
        let tenant = Uuid::new_v4();

        let docs = repo
            .create_many(tenant, vec![new_document("a"), new_document("b")])
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(repo.count(tenant, Filters::new()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_filter_by_status() {
        let repo = InMemoryDocumentRepository::in_memory();
        let tenant = Uuid::new_v4();
        let doc = repo.create(tenant, new_document("a")).await.unwrap();
        repo.create(tenant, new_document("b")).await.unwrap();

        repo.update(
            tenant,
            doc.meta.id,
            1,
            DocumentChanges::status(DocumentStatus::Processing, None),
        )
        .await
        .unwrap();

        let processing = Filters::new().eq("status", FilterValue::String("processing".into()));
        assert_eq!(repo.count(tenant, processing).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_other_tenant_update_is_not_found() {
        let repo = InMemoryDocumentRepository::in_memory();
        let doc = repo.create(Uuid::new_v4(), new_document("a")).await.unwrap();

        let result = repo
            .update(
                Uuid::new_v4(),
                doc.meta.id,
                1,
                DocumentChanges::status(DocumentStatus::Processing, None),
            )
            .await;
        assert!(matches!(result, Err(DocumentError::NotFound(id)) if id == doc.meta.id));
    }
}

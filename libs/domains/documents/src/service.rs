use axum_helpers::sanitize::{clean_text, normalize_tags};
use database::repository::{ListQuery, RepositoryError};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::error::{DocumentError, DocumentResult};
use crate::models::{
    CreateDocument, DocumentChanges, DocumentPage, DocumentResponse, DocumentStatus, MAX_TAG_LEN,
    MAX_TAGS, MAX_TITLE_LEN, NewDocument, UpdateDocumentStatus,
};
use crate::repository::DocumentRepository;

/// Largest batch accepted by [`DocumentService::register_documents`]
pub const MAX_BATCH: usize = 50;

/// Service layer for Document business logic
#[derive(Clone)]
pub struct DocumentService<R: DocumentRepository> {
    repository: Arc<R>,
}

fn normalize_title(title: &str) -> DocumentResult<String> {
    let title = clean_text(title);
    if title.is_empty() {
        return Err(DocumentError::Validation("title must not be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(DocumentError::Validation(format!(
            "title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(title)
}

fn normalize_filename(filename: &str) -> DocumentResult<String> {
    let filename = filename.trim();
    if filename.is_empty() || filename == "." || filename == ".." {
        return Err(DocumentError::Validation("filename is invalid".to_string()));
    }
    if filename.contains(['/', '\\']) || filename.chars().any(char::is_control) {
        return Err(DocumentError::Validation(
            "filename must not contain path separators or control characters".to_string(),
        ));
    }
    Ok(filename.to_string())
}

/// `type/subtype`, lowercased; parameters such as `charset` are kept.
fn normalize_content_type(content_type: &str) -> DocumentResult<String> {
    let content_type = content_type.trim().to_ascii_lowercase();
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    let valid = essence
        .split_once('/')
        .is_some_and(|(kind, sub)| {
            !kind.is_empty()
                && !sub.is_empty()
                && !sub.contains('/')
                && !essence.contains(char::is_whitespace)
        });
    if !valid {
        return Err(DocumentError::Validation(format!(
            "content_type '{}' is not a media type",
            content_type
        )));
    }
    Ok(content_type)
}

fn normalize_document_tags(tags: &[String]) -> DocumentResult<Vec<String>> {
    normalize_tags(tags, MAX_TAGS, MAX_TAG_LEN).map_err(|e| DocumentError::Validation(e.to_string()))
}

fn prepare(uploaded_by: Uuid, input: CreateDocument) -> DocumentResult<NewDocument> {
    input
        .validate()
        .map_err(|e| DocumentError::Validation(e.to_string()))?;

    Ok(NewDocument {
        uploaded_by,
        title: normalize_title(&input.title)?,
        filename: normalize_filename(&input.filename)?,
        content_type: normalize_content_type(&input.content_type)?,
        size_bytes: input.size_bytes,
        tags: normalize_document_tags(&input.tags)?,
    })
}

impl<R: DocumentRepository> DocumentService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    /// Record an uploaded file; ingestion picks it up from `uploaded`.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id))]
    pub async fn register_document(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        input: CreateDocument,
    ) -> DocumentResult<DocumentResponse> {
        let draft = prepare(user_id, input)?;
        let document = self.repository.create(tenant_id, draft).await?;

        tracing::info!(document_id = %document.meta.id, size_bytes = document.size_bytes, "Document registered");
        Ok(document.into())
    }

    /// Record several uploads at once. Any invalid entry rejects the batch.
    #[instrument(skip(self, inputs), fields(tenant_id = %tenant_id, count = inputs.len()))]
    pub async fn register_documents(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        inputs: Vec<CreateDocument>,
    ) -> DocumentResult<Vec<DocumentResponse>> {
        if inputs.is_empty() || inputs.len() > MAX_BATCH {
            return Err(DocumentError::Validation(format!(
                "a batch holds between 1 and {} documents",
                MAX_BATCH
            )));
        }
        let drafts = inputs
            .into_iter()
            .map(|input| prepare(user_id, input))
            .collect::<DocumentResult<Vec<_>>>()?;

        let documents = self.repository.create_many(tenant_id, drafts).await?;

        tracing::info!(count = documents.len(), "Documents registered");
        Ok(documents.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, document_id = %id))]
    pub async fn get_document(&self, tenant_id: Uuid, id: Uuid) -> DocumentResult<DocumentResponse> {
        let document = self
            .repository
            .get_by_id(tenant_id, id)
            .await?
            .ok_or(DocumentError::NotFound(id))?;

        Ok(document.into())
    }

    pub async fn list_documents(
        &self,
        tenant_id: Uuid,
        query: ListQuery,
    ) -> DocumentResult<DocumentPage> {
        let page = self.repository.list(tenant_id, query).await?;
        Ok(page.into())
    }

    /// Move a document through ingestion.
    ///
    /// The transition is checked against the stored status, and the write is
    /// conditional on `input.version`, so two workers racing on the same
    /// document cannot both succeed.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, document_id = %id, to = %input.status))]
    pub async fn update_status(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateDocumentStatus,
    ) -> DocumentResult<DocumentResponse> {
        input
            .validate()
            .map_err(|e| DocumentError::Validation(e.to_string()))?;

        let error_message = input
            .error_message
            .as_deref()
            .map(clean_text)
            .filter(|m| !m.is_empty());
        if input.status == DocumentStatus::Failed && error_message.is_none() {
            return Err(DocumentError::Validation(
                "error_message is required when status is 'failed'".to_string(),
            ));
        }

        let current = self
            .repository
            .get_by_id(tenant_id, id)
            .await?
            .ok_or(DocumentError::NotFound(id))?;
        if current.meta.version != input.version {
            return Err(RepositoryError::Concurrency {
                expected: input.version,
            }
            .into());
        }
        if !current.status.can_transition_to(input.status) {
            return Err(DocumentError::InvalidStatusTransition {
                from: current.status,
                to: input.status,
            });
        }

        let document = self
            .repository
            .update(
                tenant_id,
                id,
                input.version,
                DocumentChanges::status(input.status, error_message),
            )
            .await?;

        tracing::info!(from = %current.status, version = document.meta.version, "Document status changed");
        Ok(document.into())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, document_id = %id))]
    pub async fn delete_document(&self, tenant_id: Uuid, id: Uuid) -> DocumentResult<()> {
        let deleted = self.repository.delete(tenant_id, id).await?;

        if !deleted {
            return Err(DocumentError::NotFound(id));
        }

        tracing::info!("Document deleted");
        Ok(())
    }
}

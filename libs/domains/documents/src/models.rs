use chrono::{DateTime, Utc};
use database::repository::{EntityMeta, Page, TenantEntity};
use sea_orm::{DeriveActiveEnum, EnumIter, sea_query::StringLen};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub const MAX_TITLE_LEN: usize = 255;
pub const MAX_FILENAME_LEN: usize = 255;
pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_LEN: usize = 32;
pub const MAX_ERROR_LEN: usize = 2_000;
/// 100 MiB
pub const MAX_SIZE_BYTES: i64 = 100 * 1024 * 1024;

/// Ingestion state of a document
///
/// ```text
/// uploaded ──▶ processing ──▶ ready
///                  ▲    │
///                  │    ▼
///                  └── failed
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    #[sea_orm(string_value = "uploaded")]
    Uploaded,
    #[sea_orm(string_value = "processing")]
    Processing,
    #[sea_orm(string_value = "ready")]
    Ready,
    #[sea_orm(string_value = "failed")]
    Failed,
}

impl DocumentStatus {
    pub fn can_transition_to(self, next: DocumentStatus) -> bool {
        use DocumentStatus::*;
        matches!(
            (self, next),
            (Uploaded, Processing) | (Processing, Ready) | (Processing, Failed) | (Failed, Processing)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == DocumentStatus::Ready
    }
}

/// RAG source document; the file itself lives in object storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub uploaded_by: Uuid,
    pub title: String,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub status: DocumentStatus,
    pub tags: Vec<String>,
    /// Set while the document is `failed`
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewDocument {
    pub uploaded_by: Uuid,
    pub title: String,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentChanges {
    pub title: Option<String>,
    pub tags: Option<Vec<String>>,
    pub status: Option<DocumentStatus>,
    /// `Some(None)` clears the message
    pub error_message: Option<Option<String>>,
}

impl DocumentChanges {
    /// A status move; the error message is kept only for `failed`.
    pub fn status(status: DocumentStatus, error_message: Option<String>) -> Self {
        Self {
            status: Some(status),
            error_message: Some(error_message.filter(|_| status == DocumentStatus::Failed)),
            ..Default::default()
        }
    }
}

impl TenantEntity for Document {
    type Draft = NewDocument;
    type Changes = DocumentChanges;

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn from_draft(meta: EntityMeta, draft: NewDocument) -> Self {
        Self {
            meta,
            uploaded_by: draft.uploaded_by,
            title: draft.title,
            filename: draft.filename,
            content_type: draft.content_type,
            size_bytes: draft.size_bytes,
            status: DocumentStatus::Uploaded,
            tags: draft.tags,
            error_message: None,
        }
    }

    fn apply_changes(&mut self, changes: DocumentChanges) {
        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(tags) = changes.tags {
            self.tags = tags;
        }
        if let Some(status) = changes.status {
            self.status = status;
        }
        if let Some(error_message) = changes.error_message {
            self.error_message = error_message;
        }
    }
}

/// Document as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DocumentResponse {
    pub id: Uuid,
    pub uploaded_by: Uuid,
    pub title: String,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub status: DocumentStatus,
    pub tags: Vec<String>,
    pub error_message: Option<String>,
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Document> for DocumentResponse {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.meta.id,
            uploaded_by: doc.uploaded_by,
            title: doc.title,
            filename: doc.filename,
            content_type: doc.content_type,
            size_bytes: doc.size_bytes,
            status: doc.status,
            tags: doc.tags,
            error_message: doc.error_message,
            version: doc.meta.version,
            created_at: doc.meta.created_at,
            updated_at: doc.meta.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentPage {
    pub items: Vec<DocumentResponse>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl From<Page<Document>> for DocumentPage {
    fn from(page: Page<Document>) -> Self {
        let page = page.map(DocumentResponse::from);
        Self {
            items: page.items,
            next_cursor: page.next_cursor,
            has_more: page.has_more,
        }
    }
}

/// DTO for registering an uploaded file
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateDocument {
    #[validate(length(min = 1))]
    pub title: String,
    #[validate(length(min = 1, max = 255))]
    pub filename: String,
    #[validate(length(min = 3, max = 127))]
    pub content_type: String,
    #[validate(range(min = 0, max = 104857600))]
    pub size_bytes: i64,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// DTO for registering several uploads in one request
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateDocuments {
    #[validate(length(min = 1, max = 50), nested)]
    pub documents: Vec<CreateDocument>,
}

/// DTO for moving a document through ingestion
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateDocumentStatus {
    /// Version the client last read
    pub version: i32,
    pub status: DocumentStatus,
    /// Required when `status` is `failed`
    #[validate(length(min = 1, max = 2000))]
    pub error_message: Option<String>,
}

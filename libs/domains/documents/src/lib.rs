//! Documents Domain
//!
//! Records of RAG source documents and their ingestion status. The files
//! themselves and the extract/chunk/embed pipeline live elsewhere; this
//! crate tracks what was uploaded and where ingestion stands.
//!
//! # Status machine
//!
//! `uploaded -> processing -> ready | failed`, and `failed -> processing`
//! to reprocess. Every move is an optimistic-locked update.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_documents::{handlers, DocumentService, PostgresDocumentRepository};
//!
//! let service = DocumentService::new(PostgresDocumentRepository::postgres(db));
//! let router = handlers::router(service, idempotency_guard);
//! ```

pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;

pub use error::{DocumentError, DocumentResult};
pub use handlers::DocumentsApiDoc;
pub use models::{
    CreateDocument, CreateDocuments, Document, DocumentPage, DocumentResponse, DocumentStatus,
    UpdateDocumentStatus,
};
pub use repository::{
    DocumentRepository, InMemoryDocumentRepository, PostgresDocumentRepository,
    TenantDocumentRepository,
};
pub use service::DocumentService;

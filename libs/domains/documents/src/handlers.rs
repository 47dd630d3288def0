use axum::{
    Json, Router,
    extract::{OriginalUri, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use axum_helpers::{
    AppError, IdempotencyGuard, IdempotencyKey, ListParams, TenantContext, UuidPath,
    ValidatedJson,
};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::DocumentResult;
use crate::models::{
    CreateDocument, CreateDocuments, DocumentPage, DocumentResponse, DocumentStatus,
    UpdateDocumentStatus,
};
use crate::repository::DocumentRepository;
use crate::service::DocumentService;

/// OpenAPI documentation for the documents API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_documents,
        register_document,
        register_documents,
        get_document,
        update_status,
        delete_document
    ),
    components(schemas(
        DocumentResponse,
        DocumentPage,
        DocumentStatus,
        CreateDocument,
        CreateDocuments,
        UpdateDocumentStatus
    )),
    tags((name = "documents", description = "RAG source documents and their ingestion status"))
)]
pub struct DocumentsApiDoc;

pub struct DocumentsState<R: DocumentRepository> {
    pub service: DocumentService<R>,
    pub idempotency: IdempotencyGuard,
}

pub fn router<R: DocumentRepository + 'static>(
    service: DocumentService<R>,
    idempotency: IdempotencyGuard,
) -> Router {
    let state = Arc::new(DocumentsState {
        service,
        idempotency,
    });

    Router::new()
        .route("/", get(list_documents::<R>).post(register_document::<R>))
        .route("/batch", post(register_documents::<R>))
        .route("/{id}", get(get_document::<R>).delete(delete_document::<R>))
        .route("/{id}/status", patch(update_status::<R>))
        .with_state(state)
}

/// List documents of the caller's tenant
///
/// Filter by status with `filter={"status":"ready"}`.
#[utoipa::path(
    get,
    path = "",
    tag = "documents",
    params(ListParams),
    responses(
        (status = 200, description = "One page of documents", body = DocumentPage),
        (status = 400, description = "Invalid filter or cursor")
    )
)]
pub async fn list_documents<R: DocumentRepository>(
    State(state): State<Arc<DocumentsState<R>>>,
    ctx: TenantContext,
    Query(params): Query<ListParams>,
) -> Result<Json<DocumentPage>, AppError> {
    let page = state
        .service
        .list_documents(ctx.tenant_id, params.into_list_query()?)
        .await?;
    Ok(Json(page))
}

/// Register an uploaded file; honours `Idempotency-Key`
#[utoipa::path(
    post,
    path = "",
    tag = "documents",
    request_body = CreateDocument,
    responses(
        (status = 201, description = "Document registered", body = DocumentResponse),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn register_document<R: DocumentRepository>(
    State(state): State<Arc<DocumentsState<R>>>,
    ctx: TenantContext,
    key: Option<IdempotencyKey>,
    OriginalUri(uri): OriginalUri,
    ValidatedJson(input): ValidatedJson<CreateDocument>,
) -> Result<Response, AppError> {
    state
        .idempotency
        .run(&ctx, key.as_ref(), &Method::POST, uri.path(), &input, || async {
            let document = state
                .service
                .register_document(ctx.tenant_id, ctx.user_id, input.clone())
                .await?;
            Ok((StatusCode::CREATED, document))
        })
        .await
}

/// Register several uploads atomically; honours `Idempotency-Key`
#[utoipa::path(
    post,
    path = "/batch",
    tag = "documents",
    request_body = CreateDocuments,
    responses(
        (status = 201, description = "All documents registered", body = [DocumentResponse]),
        (status = 400, description = "An entry is invalid; nothing was registered")
    )
)]
pub async fn register_documents<R: DocumentRepository>(
    State(state): State<Arc<DocumentsState<R>>>,
    ctx: TenantContext,
    key: Option<IdempotencyKey>,
    OriginalUri(uri): OriginalUri,
    ValidatedJson(input): ValidatedJson<CreateDocuments>,
) -> Result<Response, AppError> {
    state
        .idempotency
        .run(&ctx, key.as_ref(), &Method::POST, uri.path(), &input, || async {
            let documents = state
                .service
                .register_documents(ctx.tenant_id, ctx.user_id, input.documents.clone())
                .await?;
            Ok((StatusCode::CREATED, documents))
        })
        .await
}

#[utoipa::path(
    get,
    path = "/{id}",
    tag = "documents",
    params(("id" = String, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document found", body = DocumentResponse),
        (status = 404, description = "Document not found")
    )
)]
pub async fn get_document<R: DocumentRepository>(
    State(state): State<Arc<DocumentsState<R>>>,
    ctx: TenantContext,
    UuidPath(id): UuidPath,
) -> DocumentResult<Json<DocumentResponse>> {
    let document = state.service.get_document(ctx.tenant_id, id).await?;
    Ok(Json(document))
}

/// Move a document to its next ingestion status
#[utoipa::path(
    patch,
    path = "/{id}/status",
    tag = "documents",
    params(("id" = String, Path, description = "Document ID")),
    request_body = UpdateDocumentStatus,
    responses(
        (status = 200, description = "Status changed", body = DocumentResponse),
        (status = 404, description = "Document not found"),
        (status = 409, description = "Stale version or transition not allowed")
    )
)]
pub async fn update_status<R: DocumentRepository>(
    State(state): State<Arc<DocumentsState<R>>>,
    ctx: TenantContext,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<UpdateDocumentStatus>,
) -> DocumentResult<Json<DocumentResponse>> {
    let document = state.service.update_status(ctx.tenant_id, id, input).await?;
    Ok(Json(document))
}

#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "documents",
    params(("id" = String, Path, description = "Document ID")),
    responses(
        (status = 204, description = "Document deleted"),
        (status = 404, description = "Document not found")
    )
)]
pub async fn delete_document<R: DocumentRepository>(
    State(state): State<Arc<DocumentsState<R>>>,
    ctx: TenantContext,
    UuidPath(id): UuidPath,
) -> DocumentResult<impl IntoResponse> {
    state.service.delete_document(ctx.tenant_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

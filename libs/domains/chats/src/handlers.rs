use axum::{
    Json, Router,
    extract::{OriginalUri, Query, State},
    http::{Method, StatusCode},
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use axum_helpers::{
    AppError, IdempotencyGuard, IdempotencyKey, ListParams, TenantContext, UuidPath,
    ValidatedJson,
};
use futures::{Stream, StreamExt, stream};
use std::convert::Infallible;
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::ChatResult;
use crate::models::{
    ChatPage, ChatResponse, CompletionRequest, CompletionResponse, CreateChat, CreateMessage,
    CreatedChat, MessagePage, MessageResponse, MessageRole, UpdateChat, UsageResponse,
};
use crate::repository::ChatRepository;
use crate::service::{ChatService, CompletionChunk};

/// Final SSE payload of a streamed completion
pub const STREAM_DONE: &str = "[DONE]";

/// OpenAPI documentation for the chats API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_chats,
        create_chat,
        get_chat,
        update_chat,
        delete_chat,
        list_messages,
        add_message,
        complete,
        complete_stream
    ),
    components(schemas(
        ChatResponse,
        ChatPage,
        CreatedChat,
        CreateChat,
        UpdateChat,
        MessageResponse,
        MessagePage,
        CreateMessage,
        MessageRole,
        CompletionRequest,
        CompletionResponse,
        UsageResponse
    )),
    tags((name = "chats", description = "Chats, messages and LLM completions"))
)]
pub struct ChatsApiDoc;

pub struct ChatsState<R: ChatRepository> {
    pub service: ChatService<R>,
    pub idempotency: IdempotencyGuard,
}

/// Create the chats router with all HTTP endpoints
pub fn router<R: ChatRepository + 'static>(
    service: ChatService<R>,
    idempotency: IdempotencyGuard,
) -> Router {
    let state = Arc::new(ChatsState {
        service,
        idempotency,
    });

    Router::new()
        .route("/", get(list_chats::<R>).post(create_chat::<R>))
        .route(
            "/{id}",
            get(get_chat::<R>)
                .patch(update_chat::<R>)
                .delete(delete_chat::<R>),
        )
        .route(
            "/{id}/messages",
            get(list_messages::<R>).post(add_message::<R>),
        )
        .route("/{id}/complete", post(complete::<R>))
        .route("/{id}/complete/stream", post(complete_stream::<R>))
        .with_state(state)
}

/// List the caller's chats
#[utoipa::path(
    get,
    path = "",
    tag = "chats",
    params(ListParams),
    responses(
        (status = 200, description = "One page of chats", body = ChatPage),
        (status = 400, description = "Invalid filter or cursor"),
        (status = 401, description = "Missing tenant context")
    )
)]
pub async fn list_chats<R: ChatRepository>(
    State(state): State<Arc<ChatsState<R>>>,
    ctx: TenantContext,
    Query(params): Query<ListParams>,
) -> Result<Json<ChatPage>, AppError> {
    let page = state
        .service
        .list_chats(ctx.tenant_id, ctx.user_id, params.into_list_query()?)
        .await?;
    Ok(Json(page))
}

/// Create a chat, optionally with its first message; honours `Idempotency-Key`
#[utoipa::path(
    post,
    path = "",
    tag = "chats",
    request_body = CreateChat,
    responses(
        (status = 201, description = "Chat created", body = CreatedChat),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Idempotency key reused concurrently")
    )
)]
pub async fn create_chat<R: ChatRepository>(
    State(state): State<Arc<ChatsState<R>>>,
    ctx: TenantContext,
    key: Option<IdempotencyKey>,
    OriginalUri(uri): OriginalUri,
    ValidatedJson(input): ValidatedJson<CreateChat>,
) -> Result<Response, AppError> {
    state
        .idempotency
        .run(&ctx, key.as_ref(), &Method::POST, uri.path(), &input, || async {
            let created = state
                .service
                .create_chat(ctx.tenant_id, ctx.user_id, input.clone())
                .await?;
            Ok((StatusCode::CREATED, created))
        })
        .await
}

/// Get one of the caller's chats
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "chats",
    params(("id" = String, Path, description = "Chat ID")),
    responses(
        (status = 200, description = "Chat found", body = ChatResponse),
        (status = 404, description = "Chat not found")
    )
)]
pub async fn get_chat<R: ChatRepository>(
    State(state): State<Arc<ChatsState<R>>>,
    ctx: TenantContext,
    UuidPath(id): UuidPath,
) -> ChatResult<Json<ChatResponse>> {
    let chat = state.service.get_chat(ctx.tenant_id, ctx.user_id, id).await?;
    Ok(Json(chat))
}

/// Rename or retag a chat; `version` must match the stored one
#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "chats",
    params(("id" = String, Path, description = "Chat ID")),
    request_body = UpdateChat,
    responses(
        (status = 200, description = "Chat updated", body = ChatResponse),
        (status = 404, description = "Chat not found"),
        (status = 409, description = "Stale version")
    )
)]
pub async fn update_chat<R: ChatRepository>(
    State(state): State<Arc<ChatsState<R>>>,
    ctx: TenantContext,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<UpdateChat>,
) -> ChatResult<Json<ChatResponse>> {
    let chat = state
        .service
        .update_chat(ctx.tenant_id, ctx.user_id, id, input)
        .await?;
    Ok(Json(chat))
}

/// Delete a chat and its messages
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "chats",
    params(("id" = String, Path, description = "Chat ID")),
    responses(
        (status = 204, description = "Chat deleted"),
        (status = 404, description = "Chat not found")
    )
)]
pub async fn delete_chat<R: ChatRepository>(
    State(state): State<Arc<ChatsState<R>>>,
    ctx: TenantContext,
    UuidPath(id): UuidPath,
) -> ChatResult<impl IntoResponse> {
    state
        .service
        .delete_chat(ctx.tenant_id, ctx.user_id, id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List a chat's messages, newest first
#[utoipa::path(
    get,
    path = "/{id}/messages",
    tag = "chats",
    params(("id" = String, Path, description = "Chat ID"), ListParams),
    responses(
        (status = 200, description = "One page of messages", body = MessagePage),
        (status = 404, description = "Chat not found")
    )
)]
pub async fn list_messages<R: ChatRepository>(
    State(state): State<Arc<ChatsState<R>>>,
    ctx: TenantContext,
    UuidPath(id): UuidPath,
    Query(params): Query<ListParams>,
) -> Result<Json<MessagePage>, AppError> {
    let page = state
        .service
        .list_messages(ctx.tenant_id, ctx.user_id, id, params.into_list_query()?)
        .await?;
    Ok(Json(page))
}

/// Append a message; honours `Idempotency-Key`
#[utoipa::path(
    post,
    path = "/{id}/messages",
    tag = "chats",
    params(("id" = String, Path, description = "Chat ID")),
    request_body = CreateMessage,
    responses(
        (status = 201, description = "Message stored", body = MessageResponse),
        (status = 404, description = "Chat not found")
    )
)]
pub async fn add_message<R: ChatRepository>(
    State(state): State<Arc<ChatsState<R>>>,
    ctx: TenantContext,
    UuidPath(id): UuidPath,
    key: Option<IdempotencyKey>,
    OriginalUri(uri): OriginalUri,
    ValidatedJson(input): ValidatedJson<CreateMessage>,
) -> Result<Response, AppError> {
    state
        .idempotency
        .run(&ctx, key.as_ref(), &Method::POST, uri.path(), &input, || async {
            let message = state
                .service
                .add_message(ctx.tenant_id, ctx.user_id, id, input.clone())
                .await?;
            Ok((StatusCode::CREATED, message))
        })
        .await
}

/// Ask the LLM to answer the chat; honours `Idempotency-Key`
#[utoipa::path(
    post,
    path = "/{id}/complete",
    tag = "chats",
    params(("id" = String, Path, description = "Chat ID")),
    request_body = CompletionRequest,
    responses(
        (status = 200, description = "Assistant reply stored", body = CompletionResponse),
        (status = 404, description = "Chat not found"),
        (status = 429, description = "LLM is rate limiting"),
        (status = 502, description = "LLM returned an invalid response"),
        (status = 503, description = "LLM unavailable or circuit open"),
        (status = 504, description = "LLM timed out")
    )
)]
pub async fn complete<R: ChatRepository>(
    State(state): State<Arc<ChatsState<R>>>,
    ctx: TenantContext,
    UuidPath(id): UuidPath,
    key: Option<IdempotencyKey>,
    OriginalUri(uri): OriginalUri,
    ValidatedJson(input): ValidatedJson<CompletionRequest>,
) -> Result<Response, AppError> {
    state
        .idempotency
        .run(&ctx, key.as_ref(), &Method::POST, uri.path(), &input, || async {
            let reply = state
                .service
                .complete(ctx.tenant_id, ctx.user_id, id, input.clone())
                .await?;
            Ok((StatusCode::OK, reply))
        })
        .await
}

fn chunk_event(chunk: ChatResult<CompletionChunk>) -> Event {
    match chunk {
        Ok(CompletionChunk::Delta(text)) => Event::default().data(text),
        Ok(CompletionChunk::Stored(message)) => Event::default()
            .event("message")
            .json_data(&message)
            .unwrap_or_else(|e| Event::default().event("error").data(e.to_string())),
        Err(err) => {
            tracing::warn!(error = %err, "Completion stream failed");
            Event::default().event("error").data(err.to_string())
        }
    }
}

/// Stream the LLM answer as server-sent events
///
/// Each text delta is a `data:` event; the stored reply follows as a
/// `message` event and the stream ends with `data: [DONE]`.
#[utoipa::path(
    post,
    path = "/{id}/complete/stream",
    tag = "chats",
    params(("id" = String, Path, description = "Chat ID")),
    request_body = CompletionRequest,
    responses(
        (status = 200, description = "Server-sent events", content_type = "text/event-stream"),
        (status = 404, description = "Chat not found"),
        (status = 503, description = "LLM unavailable or circuit open")
    )
)]
pub async fn complete_stream<R: ChatRepository + 'static>(
    State(state): State<Arc<ChatsState<R>>>,
    ctx: TenantContext,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<CompletionRequest>,
) -> ChatResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let chunks = state
        .service
        .complete_stream(ctx.tenant_id, ctx.user_id, id, input)
        .await?;

    let events = chunks
        .map(|chunk| Ok::<_, Infallible>(chunk_event(chunk)))
        .chain(stream::once(async { Ok(Event::default().data(STREAM_DONE)) }));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

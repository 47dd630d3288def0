use axum::{
    Json, Router,
    extract::{OriginalUri, Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use axum_helpers::{
    AppError, IdempotencyGuard, IdempotencyKey, ListParams, TenantContext, UuidPath,
    ValidatedJson,
};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::UserResult;
use crate::models::{CreateUser, Role, UpdateUser, UpsertUser, UserPage, UserResponse};
use crate::repository::UserRepository;
use crate::service::UserService;

/// OpenAPI documentation for the users API
#[derive(OpenApi)]
#[openapi(
    paths(list_users, create_user, get_user, update_user, delete_user, upsert_user),
    components(schemas(UserResponse, UserPage, CreateUser, UpdateUser, UpsertUser, Role)),
    tags((name = "users", description = "Tenant user administration"))
)]
pub struct UsersApiDoc;

pub struct UsersState<R: UserRepository> {
    pub service: UserService<R>,
    pub idempotency: IdempotencyGuard,
}

/// Create the users router with all HTTP endpoints
pub fn router<R: UserRepository + 'static>(
    service: UserService<R>,
    idempotency: IdempotencyGuard,
) -> Router {
    let state = Arc::new(UsersState {
        service,
        idempotency,
    });

    Router::new()
        .route("/", get(list_users::<R>).post(create_user::<R>))
        .route("/by-email", put(upsert_user::<R>))
        .route(
            "/{id}",
            get(get_user::<R>)
                .patch(update_user::<R>)
                .delete(delete_user::<R>),
        )
        .with_state(state)
}

/// List users of the caller's tenant
#[utoipa::path(
    get,
    path = "",
    tag = "users",
    params(ListParams),
    responses(
        (status = 200, description = "One page of users", body = UserPage),
        (status = 400, description = "Invalid filter or cursor"),
        (status = 401, description = "Missing tenant context")
    )
)]
pub async fn list_users<R: UserRepository>(
    State(state): State<Arc<UsersState<R>>>,
    ctx: TenantContext,
    Query(params): Query<ListParams>,
) -> Result<Json<UserPage>, AppError> {
    let page = state
        .service
        .list_users(ctx.tenant_id, params.into_list_query()?)
        .await?;
    Ok(Json(page))
}

/// Create a user; honours `Idempotency-Key`
#[utoipa::path(
    post,
    path = "",
    tag = "users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "Role requires an admin caller"),
        (status = 409, description = "Email already taken")
    )
)]
pub async fn create_user<R: UserRepository>(
    State(state): State<Arc<UsersState<R>>>,
    ctx: TenantContext,
    key: Option<IdempotencyKey>,
    OriginalUri(uri): OriginalUri,
    ValidatedJson(input): ValidatedJson<CreateUser>,
) -> Result<Response, AppError> {
    state
        .idempotency
        .run(&ctx, key.as_ref(), &Method::POST, uri.path(), &input, || async {
            let user = state
                .service
                .create_user(ctx.tenant_id, ctx.user_id, input.clone())
                .await?;
            Ok((StatusCode::CREATED, user))
        })
        .await
}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user<R: UserRepository>(
    State(state): State<Arc<UsersState<R>>>,
    ctx: TenantContext,
    UuidPath(id): UuidPath,
) -> UserResult<Json<UserResponse>> {
    let user = state.service.get_user(ctx.tenant_id, id).await?;
    Ok(Json(user))
}

/// Update a user; `version` must match the stored one
#[utoipa::path(
    patch,
    path = "/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User ID")),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = UserResponse),
        (status = 403, description = "Role change by a non-admin"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Stale version or email taken")
    )
)]
pub async fn update_user<R: UserRepository>(
    State(state): State<Arc<UsersState<R>>>,
    ctx: TenantContext,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<UpdateUser>,
) -> UserResult<Json<UserResponse>> {
    let user = state
        .service
        .update_user(ctx.tenant_id, ctx.user_id, id, input)
        .await?;
    Ok(Json(user))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user<R: UserRepository>(
    State(state): State<Arc<UsersState<R>>>,
    ctx: TenantContext,
    UuidPath(id): UuidPath,
) -> UserResult<impl IntoResponse> {
    state.service.delete_user(ctx.tenant_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Create or replace the user with the given email (admin only)
#[utoipa::path(
    put,
    path = "/by-email",
    tag = "users",
    request_body = UpsertUser,
    responses(
        (status = 200, description = "User created or replaced", body = UserResponse),
        (status = 403, description = "Caller is not an admin")
    )
)]
pub async fn upsert_user<R: UserRepository>(
    State(state): State<Arc<UsersState<R>>>,
    ctx: TenantContext,
    ValidatedJson(input): ValidatedJson<UpsertUser>,
) -> UserResult<Json<UserResponse>> {
    let user = state
        .service
        .upsert_user(ctx.tenant_id, ctx.user_id, input)
        .await?;
    Ok(Json(user))
}

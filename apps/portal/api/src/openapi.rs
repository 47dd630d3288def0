use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    components(
        schemas(axum_helpers::ErrorResponse)
    ),
    info(
        title = "ML Portal API",
        version = "0.1.0",
        description = "Tenant-scoped users, chats with LLM completions, and RAG documents"
    ),
    servers(
        (url = "/api", description = "API base path")
    ),
    nest(
        (path = "/users", api = domain_users::UsersApiDoc),
        (path = "/chats", api = domain_chats::ChatsApiDoc),
        (path = "/documents", api = domain_documents::DocumentsApiDoc),
        (path = "/embeddings", api = crate::api::embeddings::EmbeddingsApiDoc),
        (path = "/idempotency", api = crate::api::idempotency::IdempotencyApiDoc)
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_nests_every_domain() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();

        for expected in [
            "/users",
            "/users/by-email",
            "/chats/{id}/complete/stream",
            "/documents/{id}/status",
            "/embeddings",
            "/idempotency/cleanup",
        ] {
            assert!(paths.contains(&expected), "missing {expected} in {paths:?}");
        }
    }
}

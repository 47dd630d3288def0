//! Embeddings passthrough, gated by the `embeddings` circuit breaker.

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::post};
use axum_helpers::{AppError, TenantContext, ValidatedJson};
use serde::{Deserialize, Serialize};
use tracing::debug;
use upstream::EmbeddingsClient;
use utoipa::{OpenApi, ToSchema};
use validator::{Validate, ValidationError};

pub const MAX_INPUTS: usize = 64;
pub const MAX_INPUT_LEN: usize = 8_000;

#[derive(OpenApi)]
#[openapi(
    paths(embed),
    components(schemas(EmbedRequest, EmbedResponse)),
    tags((name = "embeddings", description = "Text embeddings from the configured upstream"))
)]
pub struct EmbeddingsApiDoc;

fn non_blank_inputs(inputs: &[String]) -> Result<(), ValidationError> {
    let ok = inputs
        .iter()
        .all(|input| !input.trim().is_empty() && input.chars().count() <= MAX_INPUT_LEN);
    if ok {
        Ok(())
    } else {
        Err(ValidationError::new("input_length"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct EmbedRequest {
    /// Texts to embed, each non-blank and at most 8000 characters
    #[validate(length(min = 1, max = 64), custom(function = "non_blank_inputs"))]
    pub inputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EmbedResponse {
    /// One vector per input, in input order
    pub embeddings: Vec<Vec<f32>>,
    pub dimensions: usize,
}

pub fn router(client: Arc<dyn EmbeddingsClient>) -> Router {
    Router::new().route("/", post(embed)).with_state(client)
}

/// Embed a batch of texts
#[utoipa::path(
    post,
    path = "",
    tag = "embeddings",
    request_body = EmbedRequest,
    responses(
        (status = 200, description = "Vectors in input order", body = EmbedResponse),
        (status = 400, description = "Invalid input"),
        (status = 502, description = "Upstream answered with something unusable"),
        (status = 503, description = "Embeddings circuit open or upstream unavailable"),
        (status = 504, description = "Upstream timed out")
    )
)]
pub async fn embed(
    State(client): State<Arc<dyn EmbeddingsClient>>,
    ctx: TenantContext,
    ValidatedJson(input): ValidatedJson<EmbedRequest>,
) -> Result<Json<EmbedResponse>, AppError> {
    let count = input.inputs.len();
    let embeddings = client.embed(input.inputs).await?;
    let dimensions = embeddings.first().map(Vec::len).unwrap_or_default();
    debug!(tenant_id = %ctx.tenant_id, count, dimensions, "Embedded texts");

    Ok(Json(EmbedResponse {
        embeddings,
        dimensions,
    }))
}

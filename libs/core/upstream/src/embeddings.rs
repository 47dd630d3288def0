//! OpenAI-compatible embeddings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::client::UpstreamClient;
use crate::error::{UpstreamError, UpstreamResult};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingsClient: Send + Sync {
    /// One vector per input, in input order.
    async fn embed(&self, inputs: Vec<String>) -> UpstreamResult<Vec<Vec<f32>>>;
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

pub struct OpenAiEmbeddingsClient {
    client: UpstreamClient,
    dimensions: Option<usize>,
}

impl OpenAiEmbeddingsClient {
    pub fn new(client: UpstreamClient) -> Self {
        Self {
            client,
            dimensions: None,
        }
    }

    /// Request and enforce a fixed vector width.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    fn invalid(&self, reason: String) -> UpstreamError {
        UpstreamError::InvalidResponse {
            service: self.client.name().to_string(),
            status: None,
            reason,
        }
    }

    fn ordered_vectors(&self, expected: usize, mut data: Vec<EmbeddingData>) -> UpstreamResult<Vec<Vec<f32>>> {
        if data.len() != expected {
            return Err(self.invalid(format!("expected {} embeddings, got {}", expected, data.len())));
        }

        data.sort_by_key(|d| d.index);
        if data.iter().enumerate().any(|(position, d)| d.index != position) {
            return Err(self.invalid("embedding indexes are not contiguous".to_string()));
        }

        let width = self.dimensions.or_else(|| data.first().map(|d| d.embedding.len()));
        if let Some(width) = width
            && let Some(bad) = data.iter().find(|d| d.embedding.len() != width)
        {
            return Err(self.invalid(format!(
                "embedding {} has {} dimensions, expected {}",
                bad.index,
                bad.embedding.len(),
                width
            )));
        }

        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingsClient for OpenAiEmbeddingsClient {
    #[instrument(skip(self, inputs), fields(service = %self.client.name(), inputs = inputs.len()))]
    async fn embed(&self, inputs: Vec<String>) -> UpstreamResult<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: self.client.model(),
            input: &inputs,
            dimensions: self.dimensions,
        };
        let response: EmbeddingResponse = self.client.post_json("embed", "embeddings", &request).await?;

        self.ordered_vectors(inputs.len(), response.data)
    }
}

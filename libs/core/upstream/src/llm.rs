//! OpenAI-compatible chat completions.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::client::UpstreamClient;
use crate::error::{UpstreamError, UpstreamResult};
use crate::sse::SseDecoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatOptions {
    /// Overrides the configured model
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletion {
    pub content: String,
    pub model: String,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
}

/// Text deltas of a streamed completion.
pub type TokenStream = BoxStream<'static, UpstreamResult<String>>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, messages: Vec<ChatMessage>, options: ChatOptions) -> UpstreamResult<ChatCompletion>;

    /// Gated by the breaker for the initial request only; never retried.
    async fn chat_stream(&self, messages: Vec<ChatMessage>, options: ChatOptions) -> UpstreamResult<TokenStream>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiLlmClient {
    client: UpstreamClient,
}

impl OpenAiLlmClient {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }

    fn request<'a>(&'a self, messages: &'a [ChatMessage], options: &'a ChatOptions, stream: bool) -> CompletionRequest<'a> {
        CompletionRequest {
            model: options.model.as_deref().unwrap_or(self.client.model()),
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            stream,
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> UpstreamError {
        UpstreamError::InvalidResponse {
            service: self.client.name().to_string(),
            status: None,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiLlmClient {
    #[instrument(skip(self, messages, options), fields(service = %self.client.name(), messages = messages.len()))]
    async fn chat(&self, messages: Vec<ChatMessage>, options: ChatOptions) -> UpstreamResult<ChatCompletion> {
        let body = self.request(&messages, &options, false);
        let response: CompletionResponse = self.client.post_json("chat", "chat/completions", &body).await?;

        let model = response.model.unwrap_or_else(|| body.model.to_string());
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| self.invalid("completion has no choices"))?;

        debug!(finish_reason = ?choice.finish_reason, "Chat completion received");
        Ok(ChatCompletion {
            content: choice.message.content.unwrap_or_default(),
            model,
            finish_reason: choice.finish_reason,
            usage: response.usage,
        })
    }

    async fn chat_stream(&self, messages: Vec<ChatMessage>, options: ChatOptions) -> UpstreamResult<TokenStream> {
        let body = self.request(&messages, &options, true);
        let response = self.client.connect_path("chat_stream", "chat/completions", &body).await?;

        let service = self.client.name().to_string();
        let mut bytes = response.bytes_stream();

        let stream = async_stream::try_stream! {
            let mut decoder = SseDecoder::new();
            let mut done = false;
            'read: while let Some(chunk) = bytes.next().await {
                let chunk = chunk.map_err(|e| UpstreamError::Unavailable {
                    service: service.clone(),
                    reason: format!("stream interrupted: {}", e),
                })?;
                let payloads = decoder.push(&chunk).map_err(|e| invalid_chunk(&service, e))?;

                for payload in payloads {
                    if payload == "[DONE]" {
                        done = true;
                        break 'read;
                    }
                    for content in stream_deltas(&service, &payload)? {
                        yield content;
                    }
                }
            }

            if !done {
                let tail = decoder.finish().map_err(|e| invalid_chunk(&service, e))?;
                if let Some(payload) = tail.filter(|p| p != "[DONE]") {
                    for content in stream_deltas(&service, &payload)? {
                        yield content;
                    }
                }
            }
        };

        Ok(stream.boxed())
    }
}

fn invalid_chunk(service: &str, reason: impl std::fmt::Display) -> UpstreamError {
    UpstreamError::InvalidResponse {
        service: service.to_string(),
        status: None,
        reason: format!("bad stream chunk: {}", reason),
    }
}

/// Non-empty content deltas of one streamed chunk.
fn stream_deltas(service: &str, payload: &str) -> UpstreamResult<Vec<String>> {
    let parsed: StreamChunk = serde_json::from_str(payload).map_err(|e| invalid_chunk(service, e))?;
    Ok(parsed
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.content.filter(|c| !c.is_empty()))
        .collect())
}

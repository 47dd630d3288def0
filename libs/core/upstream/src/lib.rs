//! Outbound calls to the LLM and embeddings services.
//!
//! Each upstream gets its own [`CircuitBreaker`] from a shared
//! [`BreakerRegistry`]; [`UpstreamClient`] wraps every attempt in
//! `before_call` / `on_success` / `on_failure` and retries transient
//! failures with exponential backoff. Errors come back as an
//! [`UpstreamError`] kind, never as raw transport errors.
//!
//! ```rust,ignore
//! let registry = Arc::new(BreakerRegistry::new(BreakerConfig::from_env()?));
//! let config = UpstreamConfig::llm_from_env()?;
//! let breaker = registry.get_or_create(&config.name);
//! let llm = OpenAiLlmClient::new(UpstreamClient::new(config, breaker)?);
//!
//! let reply = llm.chat(vec![ChatMessage::new(ChatRole::User, "Hi")], ChatOptions::default()).await?;
//! ```

pub mod breaker;
pub mod client;
pub mod embeddings;
pub mod error;
pub mod llm;
pub mod registry;
pub mod sse;

pub use breaker::{BreakerSnapshot, CircuitBreaker, CircuitState};
pub use client::UpstreamClient;
pub use embeddings::{EmbeddingsClient, OpenAiEmbeddingsClient};
pub use error::{UpstreamError, UpstreamResult};
pub use llm::{ChatCompletion, ChatMessage, ChatOptions, ChatRole, LlmClient, OpenAiLlmClient, TokenStream, TokenUsage};
pub use registry::BreakerRegistry;

//! Chats Domain
//!
//! Conversations owned by one user of one tenant, their messages, and LLM
//! completions over the conversation history.
//!
//! # Features
//!
//! - Names sanitised, tags lowercased and de-duplicated
//! - Owner-only access; other users get the same 404 as a missing chat
//! - Chat and first message created in one transaction
//! - Optimistic locking on update (`version`)
//! - Completion through the circuit-breaker guarded LLM client, plain or
//!   streamed as server-sent events
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_chats::{handlers, ChatService, PostgresChatRepository};
//!
//! let service = ChatService::new(PostgresChatRepository::new(db), llm_client);
//! let router = handlers::router(service, idempotency_guard);
//! ```

pub mod entity;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;

pub use error::{ChatError, ChatResult};
pub use handlers::ChatsApiDoc;
pub use models::{
    Chat, ChatPage, ChatResponse, CompletionRequest, CompletionResponse, CreateChat,
    CreateMessage, CreatedChat, Message, MessagePage, MessageResponse, MessageRole, UpdateChat,
};
pub use repository::{ChatRepository, InMemoryChatRepository, PostgresChatRepository};
pub use service::{ChatService, CompletionChunk, CompletionStream};

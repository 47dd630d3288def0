use chrono::{DateTime, Utc};
use database::repository::{EntityMeta, Page, TenantEntity};
use sea_orm::{DeriveActiveEnum, EnumIter, sea_query::StringLen};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use upstream::{ChatMessage, ChatRole, TokenUsage};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub const MAX_NAME_LEN: usize = 255;
pub const MAX_TAGS: usize = 10;
pub const MAX_TAG_LEN: usize = 32;
pub const MAX_CONTENT_LEN: usize = 32_000;
/// Messages sent to the LLM as conversation context
pub const HISTORY_LIMIT: u64 = 50;

/// Author of a message
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    DeriveActiveEnum,
    EnumIter,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageRole {
    #[default]
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "assistant")]
    Assistant,
    #[sea_orm(string_value = "system")]
    System,
}

impl From<MessageRole> for ChatRole {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::User => ChatRole::User,
            MessageRole::Assistant => ChatRole::Assistant,
            MessageRole::System => ChatRole::System,
        }
    }
}

/// Chat entity, visible to its owner only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub owner_id: Uuid,
    pub name: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewChat {
    pub owner_id: Uuid,
    pub name: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatChanges {
    pub name: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl TenantEntity for Chat {
    type Draft = NewChat;
    type Changes = ChatChanges;

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn from_draft(meta: EntityMeta, draft: NewChat) -> Self {
        Self {
            meta,
            owner_id: draft.owner_id,
            name: draft.name,
            tags: draft.tags,
        }
    }

    fn apply_changes(&mut self, changes: ChatChanges) {
        if let Some(name) = changes.name {
            self.name = name;
        }
        if let Some(tags) = changes.tags {
            self.tags = tags;
        }
    }
}

/// Message entity; immutable once written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(flatten)]
    pub meta: EntityMeta,
    pub chat_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    /// Model that produced an assistant reply
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewMessage {
    pub chat_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub model: Option<String>,
}

impl NewMessage {
    pub fn user(chat_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            chat_id,
            role: MessageRole::User,
            content: content.into(),
            model: None,
        }
    }

    pub fn assistant(chat_id: Uuid, content: impl Into<String>, model: Option<String>) -> Self {
        Self {
            chat_id,
            role: MessageRole::Assistant,
            content: content.into(),
            model,
        }
    }
}

impl TenantEntity for Message {
    type Draft = NewMessage;
    type Changes = ();

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn from_draft(meta: EntityMeta, draft: NewMessage) -> Self {
        Self {
            meta,
            chat_id: draft.chat_id,
            role: draft.role,
            content: draft.content,
            model: draft.model,
        }
    }

    fn apply_changes(&mut self, _changes: ()) {}
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        ChatMessage::new(message.role.into(), message.content.clone())
    }
}

/// Chat as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub tags: Vec<String>,
    /// Pass back on `PATCH` for optimistic locking
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Chat> for ChatResponse {
    fn from(chat: Chat) -> Self {
        Self {
            id: chat.meta.id,
            owner_id: chat.owner_id,
            name: chat.name,
            tags: chat.tags,
            version: chat.meta.version,
            created_at: chat.meta.created_at,
            updated_at: chat.meta.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub role: MessageRole,
    pub content: String,
    pub model: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Message> for MessageResponse {
    fn from(message: Message) -> Self {
        Self {
            id: message.meta.id,
            chat_id: message.chat_id,
            role: message.role,
            content: message.content,
            model: message.model,
            created_at: message.meta.created_at,
        }
    }
}

/// Response to `POST /chats`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatedChat {
    #[serde(flatten)]
    pub chat: ChatResponse,
    pub first_message: Option<MessageResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatPage {
    pub items: Vec<ChatResponse>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl From<Page<Chat>> for ChatPage {
    fn from(page: Page<Chat>) -> Self {
        let page = page.map(ChatResponse::from);
        Self {
            items: page.items,
            next_cursor: page.next_cursor,
            has_more: page.has_more,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessagePage {
    pub items: Vec<MessageResponse>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl From<Page<Message>> for MessagePage {
    fn from(page: Page<Message>) -> Self {
        let page = page.map(MessageResponse::from);
        Self {
            items: page.items,
            next_cursor: page.next_cursor,
            has_more: page.has_more,
        }
    }
}

/// DTO for creating a chat, optionally with its first user message
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateChat {
    #[validate(length(min = 1))]
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[validate(length(min = 1, max = 32000))]
    pub first_message: Option<String>,
}

/// DTO for renaming or retagging a chat
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateChat {
    /// Version the client last read
    pub version: i32,
    #[validate(length(min = 1))]
    pub name: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// DTO for appending a message
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateMessage {
    #[serde(default)]
    pub role: MessageRole,
    #[validate(length(min = 1, max = 32000))]
    pub content: String,
}

/// DTO for asking the LLM to answer the conversation
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct CompletionRequest {
    /// Appended as a user message before the LLM call
    #[validate(length(min = 1, max = 32000))]
    pub message: Option<String>,
    #[validate(range(min = 0.0, max = 2.0))]
    pub temperature: Option<f32>,
    #[validate(range(min = 1, max = 32000))]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UsageResponse {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl From<TokenUsage> for UsageResponse {
    fn from(usage: TokenUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompletionResponse {
    /// The stored assistant reply
    pub message: MessageResponse,
    pub finish_reason: Option<String>,
    pub usage: Option<UsageResponse>,
}

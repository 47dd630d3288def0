use async_stream::try_stream;
use axum_helpers::sanitize::{clean_text, normalize_tags};
use database::repository::{FilterValue, ListQuery};
use futures::StreamExt;
use futures::stream::BoxStream;
use std::sync::Arc;
use tracing::instrument;
use upstream::{ChatMessage, ChatOptions, LlmClient, UpstreamError};
use uuid::Uuid;
use validator::Validate;

use crate::error::{ChatError, ChatResult};
use crate::models::{
    Chat, ChatChanges, ChatPage, ChatResponse, CompletionRequest, CompletionResponse,
    CreateChat, CreateMessage, CreatedChat, HISTORY_LIMIT, MAX_CONTENT_LEN, MAX_NAME_LEN,
    MAX_TAG_LEN, MAX_TAGS, MessagePage, MessageResponse, NewChat, NewMessage, UpdateChat,
};
use crate::repository::ChatRepository;

/// One item of a streamed completion
#[derive(Debug, Clone)]
pub enum CompletionChunk {
    /// Text as it arrives from the LLM
    Delta(String),
    /// The assistant reply, stored once the stream has finished
    Stored(MessageResponse),
}

pub type CompletionStream = BoxStream<'static, ChatResult<CompletionChunk>>;

/// Service layer for chats, messages and LLM completions
pub struct ChatService<R: ChatRepository> {
    repository: Arc<R>,
    llm: Arc<dyn LlmClient>,
}

impl<R: ChatRepository> Clone for ChatService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            llm: Arc::clone(&self.llm),
        }
    }
}

fn normalize_name(name: &str) -> ChatResult<String> {
    let name = clean_text(name);
    if name.is_empty() {
        return Err(ChatError::Validation("name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ChatError::Validation(format!(
            "name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name)
}

fn normalize_chat_tags(tags: &[String]) -> ChatResult<Vec<String>> {
    normalize_tags(tags, MAX_TAGS, MAX_TAG_LEN).map_err(|e| ChatError::Validation(e.to_string()))
}

fn check_content(content: &str) -> ChatResult<()> {
    if content.trim().is_empty() {
        return Err(ChatError::Validation("content must not be empty".to_string()));
    }
    if content.chars().count() > MAX_CONTENT_LEN {
        return Err(ChatError::Validation(format!(
            "content must be at most {} characters",
            MAX_CONTENT_LEN
        )));
    }
    Ok(())
}

impl<R: ChatRepository> ChatService<R> {
    pub fn new(repository: R, llm: Arc<dyn LlmClient>) -> Self {
        Self {
            repository: Arc::new(repository),
            llm,
        }
    }

    /// Create a chat owned by `user_id`, with its first message in the same
    /// transaction.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, user_id = %user_id))]
    pub async fn create_chat(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        input: CreateChat,
    ) -> ChatResult<CreatedChat> {
        input
            .validate()
            .map_err(|e| ChatError::Validation(e.to_string()))?;
        if let Some(content) = &input.first_message {
            check_content(content)?;
        }

        let draft = NewChat {
            owner_id: user_id,
            name: normalize_name(&input.name)?,
            tags: normalize_chat_tags(&input.tags)?,
        };
        let (chat, first_message) = self
            .repository
            .create_chat(tenant_id, draft, input.first_message)
            .await?;

        tracing::info!(chat_id = %chat.meta.id, "Chat created");
        Ok(CreatedChat {
            chat: chat.into(),
            first_message: first_message.map(Into::into),
        })
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, chat_id = %id))]
    pub async fn get_chat(&self, tenant_id: Uuid, user_id: Uuid, id: Uuid) -> ChatResult<ChatResponse> {
        Ok(self.owned_chat(tenant_id, user_id, id).await?.into())
    }

    /// The caller's own chats, newest first unless ordered otherwise.
    pub async fn list_chats(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        mut query: ListQuery,
    ) -> ChatResult<ChatPage> {
        query.filters = std::mem::take(&mut query.filters).eq("owner_id", FilterValue::Uuid(user_id));
        let page = self.repository.list_chats(tenant_id, query).await?;
        Ok(page.into())
    }

    /// Rename or retag a chat; `input.version` must match the stored version.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, chat_id = %id))]
    pub async fn update_chat(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        id: Uuid,
        input: UpdateChat,
    ) -> ChatResult<ChatResponse> {
        input
            .validate()
            .map_err(|e| ChatError::Validation(e.to_string()))?;

        let changes = ChatChanges {
            name: input.name.as_deref().map(normalize_name).transpose()?,
            tags: input.tags.as_deref().map(normalize_chat_tags).transpose()?,
        };
        if changes.name.is_none() && changes.tags.is_none() {
            return Err(ChatError::Validation("No fields to update".to_string()));
        }

        self.owned_chat(tenant_id, user_id, id).await?;
        let chat = self
            .repository
            .update_chat(tenant_id, id, input.version, changes)
            .await?;

        tracing::info!(version = chat.meta.version, "Chat updated");
        Ok(chat.into())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, chat_id = %id))]
    pub async fn delete_chat(&self, tenant_id: Uuid, user_id: Uuid, id: Uuid) -> ChatResult<()> {
        self.owned_chat(tenant_id, user_id, id).await?;

        if !self.repository.delete_chat(tenant_id, id).await? {
            return Err(ChatError::NotFound(id));
        }

        tracing::info!("Chat deleted");
        Ok(())
    }

    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, chat_id = %chat_id))]
    pub async fn add_message(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        chat_id: Uuid,
        input: CreateMessage,
    ) -> ChatResult<MessageResponse> {
        check_content(&input.content)?;
        self.owned_chat(tenant_id, user_id, chat_id).await?;

        let message = self
            .repository
            .add_message(
                tenant_id,
                NewMessage {
                    chat_id,
                    role: input.role,
                    content: input.content,
                    model: None,
                },
            )
            .await?;

        tracing::debug!(message_id = %message.meta.id, role = %message.role, "Message added");
        Ok(message.into())
    }

    pub async fn list_messages(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        chat_id: Uuid,
        query: ListQuery,
    ) -> ChatResult<MessagePage> {
        self.owned_chat(tenant_id, user_id, chat_id).await?;
        let page = self
            .repository
            .list_messages(tenant_id, chat_id, query)
            .await?;
        Ok(page.into())
    }

    /// Ask the LLM to answer the conversation and store its reply.
    ///
    /// Nothing is stored for the assistant when the LLM call fails.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, chat_id = %chat_id))]
    pub async fn complete(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        chat_id: Uuid,
        input: CompletionRequest,
    ) -> ChatResult<CompletionResponse> {
        let (history, options) = self
            .prepare_completion(tenant_id, user_id, chat_id, input)
            .await?;

        let completion = self.llm.chat(history, options).await?;
        let reply = self
            .repository
            .add_message(
                tenant_id,
                NewMessage::assistant(chat_id, completion.content, Some(completion.model)),
            )
            .await?;

        tracing::info!(message_id = %reply.meta.id, "Completion stored");
        Ok(CompletionResponse {
            message: reply.into(),
            finish_reason: completion.finish_reason,
            usage: completion.usage.map(Into::into),
        })
    }

    /// Streamed variant of [`complete`](Self::complete). The reply is stored
    /// after the last delta; a failed stream stores nothing.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, chat_id = %chat_id))]
    pub async fn complete_stream(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        chat_id: Uuid,
        input: CompletionRequest,
    ) -> ChatResult<CompletionStream>
    where
        R: 'static,
    {
        let (history, options) = self
            .prepare_completion(tenant_id, user_id, chat_id, input)
            .await?;
        let model = options.model.clone();

        let mut tokens = self.llm.chat_stream(history, options).await?;
        let repository = Arc::clone(&self.repository);

        let stream = try_stream! {
            let mut reply = String::new();
            while let Some(delta) = tokens.next().await {
                let delta = delta?;
                reply.push_str(&delta);
                yield CompletionChunk::Delta(delta);
            }

            if reply.is_empty() {
                Err::<(), _>(UpstreamError::InvalidResponse {
                    service: "llm".to_string(),
                    status: None,
                    reason: "stream ended without content".to_string(),
                })?;
            }

            let message = repository
                .add_message(tenant_id, NewMessage::assistant(chat_id, reply, model))
                .await?;
            tracing::info!(message_id = %message.meta.id, "Streamed completion stored");
            yield CompletionChunk::Stored(message.into());
        };

        Ok(Box::pin(stream))
    }

    /// Checks ownership, appends the optional user message and loads the
    /// most recent history in chronological order.
    async fn prepare_completion(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        chat_id: Uuid,
        input: CompletionRequest,
    ) -> ChatResult<(Vec<ChatMessage>, ChatOptions)> {
        input
            .validate()
            .map_err(|e| ChatError::Validation(e.to_string()))?;
        if let Some(content) = &input.message {
            check_content(content)?;
        }

        self.owned_chat(tenant_id, user_id, chat_id).await?;
        if let Some(content) = input.message {
            self.repository
                .add_message(tenant_id, NewMessage::user(chat_id, content))
                .await?;
        }

        let recent = self
            .repository
            .list_messages(tenant_id, chat_id, ListQuery::new().with_limit(HISTORY_LIMIT))
            .await?;
        if recent.items.is_empty() {
            return Err(ChatError::Validation(
                "Chat has no messages to complete".to_string(),
            ));
        }
        let history: Vec<ChatMessage> = recent.items.iter().rev().map(ChatMessage::from).collect();

        let options = ChatOptions {
            model: None,
            temperature: input.temperature,
            max_tokens: input.max_tokens,
        };
        Ok((history, options))
    }

    /// Another user's chat is reported exactly like a missing one.
    async fn owned_chat(&self, tenant_id: Uuid, user_id: Uuid, id: Uuid) -> ChatResult<Chat> {
        match self.repository.get_chat(tenant_id, id).await? {
            Some(chat) if chat.owner_id == user_id => Ok(chat),
            _ => Err(ChatError::NotFound(id)),
        }
    }
}

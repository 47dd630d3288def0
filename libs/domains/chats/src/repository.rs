use async_trait::async_trait;
use database::repository::{
    FilterValue, InMemoryTenantRepository, ListQuery, MAX_PAGE_SIZE, Page, RepositoryError,
    TenantRepository, postgres as pg,
};
use uuid::Uuid;

use crate::entity::{chat as chat_entity, message as message_entity};

use crate::error::{ChatError, ChatResult};
use crate::models::{Chat, ChatChanges, Message, NewChat, NewMessage};

/// Repository trait for chats and their messages
///
/// Every method is scoped by `tenant_id`. Ownership by user is checked by
/// the service, not here.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Insert a chat and, atomically with it, its first user message.
    async fn create_chat(
        &self,
        tenant_id: Uuid,
        chat: NewChat,
        first_message: Option<String>,
    ) -> ChatResult<(Chat, Option<Message>)>;

    async fn get_chat(&self, tenant_id: Uuid, id: Uuid) -> ChatResult<Option<Chat>>;

    async fn list_chats(&self, tenant_id: Uuid, query: ListQuery) -> ChatResult<Page<Chat>>;

    async fn update_chat(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: i32,
        changes: ChatChanges,
    ) -> ChatResult<Chat>;

    /// Removes the chat together with its messages.
    async fn delete_chat(&self, tenant_id: Uuid, id: Uuid) -> ChatResult<bool>;

    async fn add_message(&self, tenant_id: Uuid, message: NewMessage) -> ChatResult<Message>;

    /// Newest first under the default ordering.
    async fn list_messages(
        &self,
        tenant_id: Uuid,
        chat_id: Uuid,
        query: ListQuery,
    ) -> ChatResult<Page<Message>>;
}

/// Restricts a listing to one chat's messages. The caller's filters are
/// ANDed with it, so they cannot widen the scope.
fn scoped_to_chat(mut query: ListQuery, chat_id: Uuid) -> ListQuery {
    query.filters = std::mem::take(&mut query.filters).eq("chat_id", FilterValue::Uuid(chat_id));
    query
}

fn not_found(id: Uuid) -> impl FnOnce(RepositoryError) -> ChatError {
    move |err| match err {
        RepositoryError::NotFound => ChatError::NotFound(id),
        other => other.into(),
    }
}

/// In-memory chats for development and tests
#[derive(Clone, Default)]
pub struct InMemoryChatRepository {
    chats: InMemoryTenantRepository<Chat>,
    messages: InMemoryTenantRepository<Message>,
}

impl InMemoryChatRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatRepository for InMemoryChatRepository {
    async fn create_chat(
        &self,
        tenant_id: Uuid,
        chat: NewChat,
        first_message: Option<String>,
    ) -> ChatResult<(Chat, Option<Message>)> {
        let chat = self.chats.create(tenant_id, chat).await?;
        let Some(content) = first_message else {
            return Ok((chat, None));
        };

        match self
            .messages
            .create(tenant_id, NewMessage::user(chat.meta.id, content))
            .await
        {
            Ok(message) => Ok((chat, Some(message))),
            Err(err) => {
                // Keep the pair atomic
                self.chats.delete(tenant_id, chat.meta.id).await?;
                Err(err.into())
            }
        }
    }

    async fn get_chat(&self, tenant_id: Uuid, id: Uuid) -> ChatResult<Option<Chat>> {
        Ok(self.chats.get_by_id(tenant_id, id).await?)
    }

    async fn list_chats(&self, tenant_id: Uuid, query: ListQuery) -> ChatResult<Page<Chat>> {
        Ok(self.chats.list(tenant_id, query).await?)
    }

    async fn update_chat(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: i32,
        changes: ChatChanges,
    ) -> ChatResult<Chat> {
        self.chats
            .update(tenant_id, id, Some(expected_version), changes)
            .await
            .map_err(not_found(id))
    }

    async fn delete_chat(&self, tenant_id: Uuid, id: Uuid) -> ChatResult<bool> {
        if !self.chats.delete(tenant_id, id).await? {
            return Ok(false);
        }

        let mut removed = 0;
        loop {
            let query = scoped_to_chat(ListQuery::new().with_limit(MAX_PAGE_SIZE), id);
            let page = self.messages.list(tenant_id, query).await?;
            if page.items.is_empty() {
                break;
            }
            for message in page.items {
                if self.messages.delete(tenant_id, message.meta.id).await? {
                    removed += 1;
                }
            }
        }

        tracing::debug!(tenant_id = %tenant_id, chat_id = %id, messages = removed, "Deleted chat");
        Ok(true)
    }

    async fn add_message(&self, tenant_id: Uuid, message: NewMessage) -> ChatResult<Message> {
        if !self.chats.exists(tenant_id, message.chat_id).await? {
            return Err(RepositoryError::ForeignKeyViolation(format!(
                "chat {} does not exist",
                message.chat_id
            ))
            .into());
        }
        Ok(self.messages.create(tenant_id, message).await?)
    }

    async fn list_messages(
        &self,
        tenant_id: Uuid,
        chat_id: Uuid,
        query: ListQuery,
    ) -> ChatResult<Page<Message>> {
        Ok(self
            .messages
            .list(tenant_id, scoped_to_chat(query, chat_id))
            .await?)
    }
}

/// PostgreSQL chats and messages tables
///
/// Messages reference their chat with `ON DELETE CASCADE`.
#[derive(Clone)]
pub struct PostgresChatRepository {
    db: sea_orm::DatabaseConnection,
}

impl PostgresChatRepository {
    pub fn new(db: sea_orm::DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ChatRepository for PostgresChatRepository {
    async fn create_chat(
        &self,
        tenant_id: Uuid,
        chat: NewChat,
        first_message: Option<String>,
    ) -> ChatResult<(Chat, Option<Message>)> {
        let created = database::with_transaction(&self.db, move |txn| {
            Box::pin(async move {
                let chat = pg::create::<chat_entity::Entity, _>(txn, tenant_id, chat).await?;
                let message = match first_message {
                    Some(content) => Some(
                        pg::create::<message_entity::Entity, _>(
                            txn,
                            tenant_id,
                            NewMessage::user(chat.meta.id, content),
                        )
                        .await?,
                    ),
                    None => None,
                };
                Ok((chat, message))
            })
        })
        .await?;

        tracing::debug!(tenant_id = %tenant_id, chat_id = %created.0.meta.id, "Inserted chat");
        Ok(created)
    }

    async fn get_chat(&self, tenant_id: Uuid, id: Uuid) -> ChatResult<Option<Chat>> {
        Ok(pg::get_by_id::<chat_entity::Entity, _>(&self.db, tenant_id, id).await?)
    }

    async fn list_chats(&self, tenant_id: Uuid, query: ListQuery) -> ChatResult<Page<Chat>> {
        Ok(pg::list::<chat_entity::Entity, _>(&self.db, tenant_id, query).await?)
    }

    async fn update_chat(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        expected_version: i32,
        changes: ChatChanges,
    ) -> ChatResult<Chat> {
        pg::update::<chat_entity::Entity, _>(
            &self.db,
            tenant_id,
            id,
            Some(expected_version),
            changes,
        )
        .await
        .map_err(not_found(id))
    }

    async fn delete_chat(&self, tenant_id: Uuid, id: Uuid) -> ChatResult<bool> {
        Ok(pg::delete::<chat_entity::Entity, _>(&self.db, tenant_id, id).await?)
    }

    async fn add_message(&self, tenant_id: Uuid, message: NewMessage) -> ChatResult<Message> {
        Ok(pg::create::<message_entity::Entity, _>(&self.db, tenant_id, message).await?)
    }

    async fn list_messages(
        &self,
        tenant_id: Uuid,
        chat_id: Uuid,
        query: ListQuery,
    ) -> ChatResult<Page<Message>> {
        Ok(pg::list::<message_entity::Entity, _>(
            &self.db,
            tenant_id,
            scoped_to_chat(query, chat_id),
        )
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::repository::Filters;

    fn new_chat(owner: Uuid, name: &str) -> NewChat {
        NewChat {
            owner_id: owner,
            name: name.to_string(),
            tags: vec!["work".to_string()],
        }
    }

    #[tokio::test]
    async fn test_create_chat_with_first_message() {
        let repo = InMemoryChatRepository::new();
        let tenant = Uuid::new_v4();

        let (chat, message) = repo
            .create_chat(tenant, new_chat(Uuid::new_v4(), "Planning"), Some("Hi".to_string()))
            .await
            .unwrap();

        let message = message.unwrap();
        assert_eq!(message.chat_id, chat.meta.id);
        assert_eq!(message.content, "Hi");

        let page = repo
            .list_messages(tenant, chat.meta.id, ListQuery::new())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn test_messages_are_scoped_to_their_chat() {
        let repo = InMemoryChatRepository::new();
        let tenant = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let (a, _) = repo.create_chat(tenant, new_chat(owner, "a"), None).await.unwrap();
        let (b, _) = repo.create_chat(tenant, new_chat(owner, "b"), None).await.unwrap();

        repo.add_message(tenant, NewMessage::user(a.meta.id, "for a"))
            .await
            .unwrap();
        repo.add_message(tenant, NewMessage::user(b.meta.id, "for b"))
            .await
            .unwrap();

        // A caller-supplied chat_id filter cannot widen the scope
        let sneaky = ListQuery::new()
            .with_filters(Filters::new().eq("chat_id", FilterValue::Uuid(b.meta.id)));
        let page = repo.list_messages(tenant, a.meta.id, sneaky).await.unwrap();
        assert!(page.items.is_empty());

        let page = repo
            .list_messages(tenant, a.meta.id, ListQuery::new())
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].content, "for a");
    }

    #[tokio::test]
    async fn test_delete_chat_cascades_to_messages() {
        let repo = InMemoryChatRepository::new();
        let tenant = Uuid::new_v4();
        let (chat, _) = repo
            .create_chat(tenant, new_chat(Uuid::new_v4(), "Planning"), Some("one".into()))
            .await
            .unwrap();
        repo.add_message(tenant, NewMessage::assistant(chat.meta.id, "two", None))
            .await
            .unwrap();

        assert!(repo.delete_chat(tenant, chat.meta.id).await.unwrap());
        assert!(repo.messages.is_empty().await);
        assert!(!repo.delete_chat(tenant, chat.meta.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_add_message_to_missing_chat_is_rejected() {
        let repo = InMemoryChatRepository::new();
        let result = repo
            .add_message(Uuid::new_v4(), NewMessage::user(Uuid::new_v4(), "orphan"))
            .await;
        assert!(matches!(
            result,
            Err(ChatError::Repository(RepositoryError::ForeignKeyViolation(_)))
        ));
    }

    #[tokio::test]
    async fn test_other_tenant_cannot_touch_chat() {
        let repo = InMemoryChatRepository::new();
        let owner_tenant = Uuid::new_v4();
        let other = Uuid::new_v4();
        let (chat, _) = repo
            .create_chat(owner_tenant, new_chat(Uuid::new_v4(), "Private"), None)
            .await
            .unwrap();

        assert!(repo.get_chat(other, chat.meta.id).await.unwrap().is_none());
        let result = repo
            .update_chat(other, chat.meta.id, 1, ChatChanges::default())
            .await;
        assert!(matches!(result, Err(ChatError::NotFound(id)) if id == chat.meta.id));
        assert!(!repo.delete_chat(other, chat.meta.id).await.unwrap());
        assert!(
            repo.add_message(other, NewMessage::user(chat.meta.id, "x"))
                .await
                .is_err()
        );
    }
}

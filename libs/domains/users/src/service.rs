use axum_helpers::sanitize::clean_text;
use database::repository::{Filters, ListQuery};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::error::{UserError, UserResult};
use crate::models::{
    CreateUser, NewUser, Role, UpdateUser, UpsertUser, User, UserChanges, UserPage, UserResponse,
};
use crate::repository::UserRepository;

/// Service layer for User business logic
#[derive(Clone)]
pub struct UserService<R: UserRepository> {
    repository: Arc<R>,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn normalize_display_name(name: &str) -> UserResult<String> {
    let name = clean_text(name);
    if name.is_empty() {
        return Err(UserError::Validation("display_name must not be empty".to_string()));
    }
    Ok(name)
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    /// Create a user in the caller's tenant.
    ///
    /// Any role above `reader` needs an admin caller, except for the first
    /// user of a tenant.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id))]
    pub async fn create_user(
        &self,
        tenant_id: Uuid,
        actor_id: Uuid,
        input: CreateUser,
    ) -> UserResult<UserResponse> {
        let input = CreateUser {
            email: normalize_email(&input.email),
            display_name: normalize_display_name(&input.display_name)?,
            role: input.role,
        };
        input
            .validate()
            .map_err(|e| UserError::Validation(e.to_string()))?;

        let role = input.role.unwrap_or_default();
        if role != Role::Reader {
            self.require_admin(tenant_id, actor_id, true).await?;
        }

        let user = self
            .repository
            .create(
                tenant_id,
                NewUser {
                    email: input.email,
                    display_name: input.display_name,
                    role,
                    is_active: true,
                },
            )
            .await?;

        tracing::info!(user_id = %user.meta.id, role = %user.role, "User created");
        Ok(user.into())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, user_id = %id))]
    pub async fn get_user(&self, tenant_id: Uuid, id: Uuid) -> UserResult<UserResponse> {
        let user = self
            .repository
            .get_by_id(tenant_id, id)
            .await?
            .ok_or(UserError::NotFound(id))?;

        Ok(user.into())
    }

    pub async fn list_users(&self, tenant_id: Uuid, query: ListQuery) -> UserResult<UserPage> {
        let page = self.repository.list(tenant_id, query).await?;
        Ok(page.into())
    }

    /// Update a user; `input.version` must match the stored version.
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id, user_id = %id))]
    pub async fn update_user(
        &self,
        tenant_id: Uuid,
        actor_id: Uuid,
        id: Uuid,
        input: UpdateUser,
    ) -> UserResult<UserResponse> {
        let changes = UserChanges {
            email: input.email.as_deref().map(normalize_email),
            display_name: input
                .display_name
                .as_deref()
                .map(normalize_display_name)
                .transpose()?,
            role: input.role,
            is_active: input.is_active,
        };
        let normalized = UpdateUser {
            version: input.version,
            email: changes.email.clone(),
            display_name: changes.display_name.clone(),
            role: changes.role,
            is_active: changes.is_active,
        };
        normalized
            .validate()
            .map_err(|e| UserError::Validation(e.to_string()))?;

        if changes.is_empty() {
            return Err(UserError::Validation("No fields to update".to_string()));
        }
        if changes.role.is_some() {
            self.require_admin(tenant_id, actor_id, false).await?;
        }

        let user = self
            .repository
            .update(tenant_id, id, input.version, changes)
            .await?;

        tracing::info!(version = user.meta.version, "User updated");
        Ok(user.into())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, user_id = %id))]
    pub async fn delete_user(&self, tenant_id: Uuid, id: Uuid) -> UserResult<()> {
        let deleted = self.repository.delete(tenant_id, id).await?;

        if !deleted {
            return Err(UserError::NotFound(id));
        }

        tracing::info!("User deleted");
        Ok(())
    }

    /// Create or replace the user with `input.email`. Provisioning is an
    /// admin operation (or the tenant's first user).
    #[instrument(skip(self, input), fields(tenant_id = %tenant_id))]
    pub async fn upsert_user(
        &self,
        tenant_id: Uuid,
        actor_id: Uuid,
        input: UpsertUser,
    ) -> UserResult<UserResponse> {
        let input = UpsertUser {
            email: normalize_email(&input.email),
            display_name: normalize_display_name(&input.display_name)?,
            ..input
        };
        input
            .validate()
            .map_err(|e| UserError::Validation(e.to_string()))?;

        self.require_admin(tenant_id, actor_id, true).await?;

        let user = self
            .repository
            .upsert_by_email(
                tenant_id,
                NewUser {
                    email: input.email,
                    display_name: input.display_name,
                    role: input.role,
                    is_active: input.is_active,
                },
            )
            .await?;

        tracing::info!(user_id = %user.meta.id, version = user.meta.version, "User upserted");
        Ok(user.into())
    }

    /// Passes when `actor_id` is an active admin of the tenant, or when
    /// `allow_bootstrap` is set and the tenant has no users yet.
    async fn require_admin(
        &self,
        tenant_id: Uuid,
        actor_id: Uuid,
        allow_bootstrap: bool,
    ) -> UserResult<()> {
        if allow_bootstrap && self.repository.count(tenant_id, Filters::new()).await? == 0 {
            return Ok(());
        }

        let actor: Option<User> = self.repository.get_by_id(tenant_id, actor_id).await?;
        match actor {
            Some(actor) if actor.role == Role::Admin && actor.is_active => Ok(()),
            _ => {
                tracing::info!(actor_id = %actor_id, "Role change refused for non-admin");
                Err(UserError::Forbidden(
                    "Only admins may assign roles".to_string(),
                ))
            }
        }
    }
}

use chrono::{DateTime, Utc};
use database::repository::{EntityMeta, Page, TenantEntity};
use sea_orm::{DeriveActiveEnum, EnumIter, sea_query::StringLen};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Role of a user within its tenant
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
pub enum Role {
    /// May change roles and provision users
    #[sea_orm(string_value = "admin")]
    Admin,
    #[sea_orm(string_value = "editor")]
    Editor,
    #[default]
    #[sea_orm(string_value = "reader")]
    Reader,
}

/// User entity, owned by one tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(flatten)]
    pub meta: EntityMeta,
    /// Trimmed and lowercased; unique per tenant
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub is_active: bool,
}

/// Insert payload, already normalised by the service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewUser {
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub is_active: bool,
}

/// Partial update, already normalised by the service
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.email.is_none()
            && self.display_name.is_none()
            && self.role.is_none()
            && self.is_active.is_none()
    }
}

impl TenantEntity for User {
    type Draft = NewUser;
    type Changes = UserChanges;

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn from_draft(meta: EntityMeta, draft: NewUser) -> Self {
        Self {
            meta,
            email: draft.email,
            display_name: draft.display_name,
            role: draft.role,
            is_active: draft.is_active,
        }
    }

    fn apply_changes(&mut self, changes: UserChanges) {
        if let Some(email) = changes.email {
            self.email = email;
        }
        if let Some(display_name) = changes.display_name {
            self.display_name = display_name;
        }
        if let Some(role) = changes.role {
            self.role = role;
        }
        if let Some(is_active) = changes.is_active {
            self.is_active = is_active;
        }
    }
}

/// User as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub is_active: bool,
    /// Pass back on `PATCH` for optimistic locking
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.meta.id,
            email: user.email,
            display_name: user.display_name,
            role: user.role,
            is_active: user.is_active,
            version: user.meta.version,
            created_at: user.meta.created_at,
            updated_at: user.meta.updated_at,
        }
    }
}

/// One page of users
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserPage {
    pub items: Vec<UserResponse>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

impl From<Page<User>> for UserPage {
    fn from(page: Page<User>) -> Self {
        let page = page.map(UserResponse::from);
        Self {
            items: page.items,
            next_cursor: page.next_cursor,
            has_more: page.has_more,
        }
    }
}

/// DTO for creating a user
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(email, length(max = 255))]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub display_name: String,
    /// Defaults to `reader`; anything else requires an admin caller
    #[serde(default)]
    pub role: Option<Role>,
}

/// DTO for updating a user
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateUser {
    /// Version the client last read
    pub version: i32,
    #[validate(email, length(max = 255))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub display_name: Option<String>,
    /// Admin only
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

/// DTO for creating or replacing a user identified by email
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpsertUser {
    #[validate(email, length(max = 255))]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub display_name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_role_round_trips_through_strings() {
        assert_eq!(Role::Admin.to_string(), "admin");
        assert_eq!(Role::from_str("editor").unwrap(), Role::Editor);
        assert!(Role::from_str("owner").is_err());
        assert_eq!(Role::default(), Role::Reader);
    }

    #[test]
    fn test_user_serializes_meta_inline() {
        let user = User::from_draft(
            EntityMeta::new(Uuid::new_v4()),
            NewUser {
                email: "ada@example.com".to_string(),
                display_name: "Ada".to_string(),
                role: Role::Editor,
                is_active: true,
            },
        );
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["role"], "editor");
        assert_eq!(json["email"], "ada@example.com");
    }

    #[test]
    fn test_apply_changes_touches_only_given_fields() {
        let mut user = User::from_draft(
            EntityMeta::new(Uuid::new_v4()),
            NewUser {
                email: "ada@example.com".to_string(),
                display_name: "Ada".to_string(),
                role: Role::Reader,
                is_active: true,
            },
        );
        user.apply_changes(UserChanges {
            is_active: Some(false),
            ..Default::default()
        });
        assert!(!user.is_active);
        assert_eq!(user.display_name, "Ada");
        assert_eq!(user.role, Role::Reader);
    }
}

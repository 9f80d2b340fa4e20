use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::{Principal, Role};
use crate::errors::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn principal(&self) -> Principal {
        Principal::new(self.id, &self.name, &self.email, self.role)
    }
}

impl crate::events::Loggable for User {
    fn entity_type() -> &'static str { "user" }
    fn subject_id(&self) -> Uuid { self.id }
    fn severity(&self) -> crate::events::Severity { crate::events::Severity::Critical }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbUser> for User {
    type Error = AppError;

    fn try_from(value: DbUser) -> Result<Self, Self::Error> {
        let role = value
            .role
            .parse::<Role>()
            .map_err(|err| AppError::internal(format!("stored user {}: {err}", value.id)))?;

        Ok(User {
            id: value.id,
            name: value.name,
            email: value.email,
            role,
            phone: value.phone,
            address: value.address,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

/// Self-service sign-up. Admin accounts cannot be registered this way.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = "Ada Lovelace")]
    pub name: Option<String>,
    #[schema(example = "ada@school.test")]
    pub email: Option<String>,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: Option<String>,
    pub role: Option<Role>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "ada@school.test")]
    pub email: Option<String>,
    #[schema(example = "S3cureP@ssw0rd")]
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UserCreateRequest {
    #[schema(example = "Grace Hopper")]
    pub name: Option<String>,
    #[schema(example = "grace@school.test")]
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<Role>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UserUpdateRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    /// Changing the role requires the admin role.
    pub role: Option<Role>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::authz::{ResourceRef, ResourceType};
use crate::errors::AppResult;
use crate::models::activity::ActivityEntry;
use crate::models::class::Class;
use crate::models::student::Student;
use crate::models::teacher::Teacher;
use crate::models::user::User;

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub async fn init() -> anyhow::Result<SqlitePool> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&database_url)
        .await
        .context("failed to connect to database")?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("failed to run migrations")?;

    Ok(pool)
}

/// Persistence boundary for every service.
///
/// `get_*`, `update_*` and `delete_*` fail with `NotFound` for unknown ids.
/// Uniqueness and reference violations surface as `Conflict`. Multi-row
/// writes are atomic.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> AppResult<()>;

    /// Resolves the ownership metadata of one record.
    async fn find_resource_ref(&self, resource_type: ResourceType, id: Uuid) -> AppResult<ResourceRef>;

    async fn exists(&self, resource_type: ResourceType, id: Uuid) -> AppResult<bool>;

    async fn create_user(&self, user: &User, password_hash: &str) -> AppResult<()>;
    async fn get_user(&self, id: Uuid) -> AppResult<User>;
    /// The user and stored password hash for a login email.
    async fn find_credentials(&self, email: &str) -> AppResult<Option<(User, String)>>;
    async fn list_users(&self) -> AppResult<Vec<User>>;
    /// `password_hash` of `None` keeps the current password.
    async fn update_user(&self, user: &User, password_hash: Option<&str>) -> AppResult<()>;
    async fn delete_user(&self, id: Uuid) -> AppResult<()>;
    /// Number of student and teacher profiles attached to an account.
    async fn count_profiles(&self, user_id: Uuid) -> AppResult<i64>;
    /// Number of students listing the account as a guardian.
    async fn count_guardian_links(&self, user_id: Uuid) -> AppResult<i64>;

    async fn create_class(&self, class: &Class) -> AppResult<()>;
    async fn get_class(&self, id: Uuid) -> AppResult<Class>;
    async fn list_classes(&self) -> AppResult<Vec<Class>>;
    async fn update_class(&self, class: &Class) -> AppResult<()>;
    async fn delete_class(&self, id: Uuid) -> AppResult<()>;
    async fn count_students_in_class(&self, class_id: Uuid, section: Option<&str>) -> AppResult<i64>;

    /// Inserts the login account and the profile in one transaction.
    async fn create_student(&self, account: &User, password_hash: &str, student: &Student) -> AppResult<()>;
    async fn get_student(&self, id: Uuid) -> AppResult<Student>;
    async fn list_students(&self) -> AppResult<Vec<Student>>;
    async fn update_student(&self, student: &Student) -> AppResult<()>;
    async fn delete_student(&self, id: Uuid) -> AppResult<()>;

    /// Inserts the login account and the profile in one transaction.
    async fn create_teacher(&self, account: &User, password_hash: &str, teacher: &Teacher) -> AppResult<()>;
    async fn get_teacher(&self, id: Uuid) -> AppResult<Teacher>;
    async fn list_teachers(&self) -> AppResult<Vec<Teacher>>;
    async fn update_teacher(&self, teacher: &Teacher) -> AppResult<()>;
    async fn delete_teacher(&self, id: Uuid) -> AppResult<()>;

    async fn append_activity(&self, entry: &ActivityEntry) -> AppResult<()>;
    async fn last_activity_hash(&self) -> AppResult<Option<String>>;
    /// Newest first.
    async fn list_activity(&self, limit: i64) -> AppResult<Vec<ActivityEntry>>;
}

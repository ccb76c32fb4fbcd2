//! Persistence seam. Handlers only ever see `Arc<dyn Store>`.

use async_trait::async_trait;
use thiserror::Error;

use crate::themes::repo_types::{NewTheme, Theme};
use crate::users::repo_types::{NewUser, Role, User, UserChanges};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique constraint (user name) was violated.
    #[error("unique constraint violated")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict,
            _ => StoreError::Other(err.into()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn find_user(&self, id: i64) -> StoreResult<Option<User>>;
    async fn find_user_by_name(&self, name: &str) -> StoreResult<Option<User>>;
    async fn create_user(&self, new: NewUser) -> StoreResult<User>;
    /// Applies the changes and renames the owner on the user's themes.
    /// Returns `None` when the user does not exist.
    async fn update_user(&self, id: i64, changes: UserChanges) -> StoreResult<Option<User>>;
    /// Returns `false` when the user does not exist.
    async fn set_role(&self, id: i64, role: Role) -> StoreResult<bool>;
    async fn delete_user(&self, id: i64) -> StoreResult<bool>;

    /// Ordered by id. Without `include_unapproved` only approved rows are returned.
    async fn list_themes(&self, include_unapproved: bool) -> StoreResult<Vec<Theme>>;
    async fn find_theme(&self, id: i64) -> StoreResult<Option<Theme>>;
    async fn create_theme(&self, new: NewTheme) -> StoreResult<Theme>;
    /// Sets `approved = true`; returns `false` when the theme does not exist.
    async fn approve_theme(&self, id: i64) -> StoreResult<bool>;
    async fn delete_theme(&self, id: i64) -> StoreResult<bool>;
}

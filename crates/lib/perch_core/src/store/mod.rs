//! Credential store gateway.
//!
//! The identity pipeline only talks to [`Store`]. Uniqueness of logins per
//! forge, credential usernames and credential owners is the store's job and
//! must hold under concurrent writers.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::auth::{AuthCredential, Forge, ModelError, User};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid record: {0}")]
    Invalid(#[from] ModelError),

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(db.message().to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Lookup and persistence of users and their local credentials.
#[async_trait]
pub trait Store: Send + Sync {
    async fn find_credential_by_username(&self, username: &str) -> StoreResult<AuthCredential>;

    async fn find_user_by_id(&self, id: i64) -> StoreResult<User>;

    async fn find_user_by_login(&self, forge_id: i64, login: &str) -> StoreResult<User>;

    async fn find_user_by_email(&self, forge_id: i64, email: &str) -> StoreResult<User>;

    async fn list_forges(&self) -> StoreResult<Vec<Forge>>;

    /// Insert a user, assigning its id. `(forge_id, login)` is unique.
    async fn create_user(&self, user: User) -> StoreResult<User>;

    /// Insert a user and a credential named after its login in one step.
    /// Both rows persist or neither does.
    async fn create_user_with_credential(
        &self,
        user: User,
        password_hash: String,
    ) -> StoreResult<(User, AuthCredential)>;

    /// Delete a user together with its credential.
    async fn delete_user(&self, id: i64) -> StoreResult<()>;

    /// Insert a credential. Username and owning user are both unique.
    async fn create_credential(&self, credential: AuthCredential) -> StoreResult<AuthCredential>;

    /// Upsert the credential of `credential.user_id`.
    async fn update_credential(&self, credential: AuthCredential) -> StoreResult<AuthCredential>;
}

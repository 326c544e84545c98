//! Identity domain models.
//!
//! These are internal domain models, distinct from the API request/response
//! types in `perch_api::models`.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Forge used when a caller does not name one.
pub const DEFAULT_FORGE_ID: i64 = 1;

/// Longest accepted login / credential username.
pub const MAX_LOGIN_LEN: usize = 250;

static RE_LOGIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[.a-zA-Z0-9_-]+$").expect("login pattern compiles"));

/// Reasons a model fails validation before it may be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("invalid user login")]
    InvalidLogin,

    #[error("invalid user email")]
    InvalidEmail,

    #[error("invalid auth user login")]
    InvalidCredentialLogin,

    #[error("invalid auth user password")]
    InvalidCredentialPassword,
}

/// Whether `login` is acceptable as a user login or credential username.
pub fn is_valid_login(login: &str) -> bool {
    !login.is_empty() && login.len() <= MAX_LOGIN_LEN && RE_LOGIN.is_match(login)
}

/// A principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub email: String,
    #[serde(rename = "avatar_url")]
    pub avatar: String,
    pub admin: bool,
    /// Per-user token signing secret. Never serialized.
    #[serde(skip)]
    pub hash: String,
    pub forge_id: i64,
    pub forge_remote_id: String,
}

impl User {
    /// Validate the user before it is created or updated.
    pub fn validate(&self) -> Result<(), ModelError> {
        if !is_valid_login(&self.login) {
            return Err(ModelError::InvalidLogin);
        }
        if self.email.len() > 500 {
            return Err(ModelError::InvalidEmail);
        }
        Ok(())
    }
}

/// Local username/password binding for a [`User`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCredential {
    pub id: i64,
    /// Owning user; at most one credential per user.
    pub user_id: i64,
    /// Unique across all credentials.
    pub username: String,
    /// bcrypt digest.
    pub password_hash: String,
    /// Unix seconds.
    pub created: i64,
    /// Unix seconds.
    pub updated: i64,
}

impl AuthCredential {
    /// Build an unsaved credential for `user_id`.
    pub fn new(user_id: i64, username: &str, password_hash: String) -> Self {
        Self {
            id: 0,
            user_id,
            username: username.to_string(),
            password_hash,
            created: 0,
            updated: 0,
        }
    }

    /// Validate the record. A credential with an empty digest is never valid.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.user_id == 0 || !is_valid_login(&self.username) {
            return Err(ModelError::InvalidCredentialLogin);
        }
        if self.password_hash.is_empty() {
            return Err(ModelError::InvalidCredentialPassword);
        }
        Ok(())
    }
}

/// A configured forge. Logins are unique per forge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forge {
    pub id: i64,
    pub kind: String,
    pub url: String,
}

/// Repository-level permission of the current principal, inserted into the
/// request by whatever loads the addressed resource.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perm {
    pub pull: bool,
    pub push: bool,
    pub admin: bool,
}

//! Request and response bodies.

use serde::{Deserialize, Serialize};

/// Generic error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// `POST /api/auth/login` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// `POST /api/auth/login` response, for every outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Session lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<i64>,
}

impl LoginResponse {
    pub fn failure(message: &str) -> Self {
        Self {
            success: false,
            message: Some(message.to_string()),
            token: None,
            expires_in: None,
        }
    }

    pub fn success(token: String, expires_in: i64) -> Self {
        Self {
            success: true,
            message: None,
            token: Some(token),
            expires_in: Some(expires_in),
        }
    }
}

/// `POST /api/users` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateUserRequest {
    pub login: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, rename = "avatar_url")]
    pub avatar: String,
    #[serde(default)]
    pub forge_id: Option<i64>,
    #[serde(default)]
    pub admin: bool,
    #[serde(default)]
    pub password: Option<String>,
}

/// `PUT /api/users/{login}/password` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetPasswordRequest {
    pub password: String,
    #[serde(default)]
    pub forge_id: Option<i64>,
}

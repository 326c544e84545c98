//! Password login.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use perch_core::auth::csrf;
use perch_core::auth::password::verify_password_blocking;
use perch_core::auth::token::{Token, TokenKind};
use perch_core::models::auth::User;
use perch_core::store::StoreError;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::AppState;
use crate::models::{LoginRequest, LoginResponse};

/// Login failures. Every variant renders as a [`LoginResponse`].
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            LoginError::BadRequest(m) => (StatusCode::BAD_REQUEST, *m),
            LoginError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "invalid credentials"),
            LoginError::Internal(detail) => {
                error!(detail = %detail, "login failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        };
        (status, Json(LoginResponse::failure(message))).into_response()
    }
}

/// Everything a successful login hands back to the client.
#[derive(Debug, Clone)]
pub struct LoginGrant {
    pub user: User,
    /// Session token for the HttpOnly cookie.
    pub session_token: String,
    /// CSRF proof matching the session token.
    pub csrf_proof: String,
    /// Bearer token for the response body.
    pub bearer: String,
    /// Session lifetime in seconds.
    pub expires_in: i64,
}

/// Verify `username`/`password` and mint the session and bearer tokens.
///
/// Unknown usernames, wrong passwords and credentials pointing at a missing
/// user all produce the same [`LoginError::InvalidCredentials`].
pub async fn login(state: &AppState, request: LoginRequest) -> Result<LoginGrant, LoginError> {
    let username = request.username.trim();
    if username.is_empty() || request.password.trim().is_empty() {
        return Err(LoginError::BadRequest("username and password required"));
    }

    let credential = match state.store.find_credential_by_username(username).await {
        Ok(c) => c,
        Err(StoreError::NotFound) => return Err(LoginError::InvalidCredentials),
        Err(e) => return Err(LoginError::Internal(e.to_string())),
    };

    match verify_password_blocking(request.password, credential.password_hash.clone()).await {
        Ok(true) => {}
        Ok(false) => return Err(LoginError::InvalidCredentials),
        Err(e) => {
            debug!(username, error = %e, "password verification failed");
            return Err(LoginError::InvalidCredentials);
        }
    }

    let user = match state.store.find_user_by_id(credential.user_id).await {
        Ok(u) => u,
        Err(StoreError::NotFound) => {
            warn!(
                credential_id = credential.id,
                user_id = credential.user_id,
                "credential references a missing user"
            );
            return Err(LoginError::InvalidCredentials);
        }
        Err(e) => return Err(LoginError::Internal(e.to_string())),
    };

    let expires_in = state.config.session_expires.num_seconds();
    let exp = Utc::now().timestamp() + expires_in;
    let session_token = Token::for_user(TokenKind::Session, user.id)
        .sign_expires(&user.hash, exp)
        .map_err(|e| LoginError::Internal(format!("sign session token: {e}")))?;
    let csrf_proof = csrf::proof(&user.hash, user.id)
        .map_err(|e| LoginError::Internal(format!("csrf proof: {e}")))?;

    // A failed JWT issuance hands out the session token as bearer instead.
    let bearer = match state.jwt.issue(&user) {
        Ok(jwt) => jwt,
        Err(e) => {
            warn!(
                user_id = user.id,
                error = %e,
                "jwt issuance failed, using session token as bearer"
            );
            session_token.clone()
        }
    };

    debug!(user_id = user.id, "login succeeded");
    Ok(LoginGrant {
        user,
        session_token,
        csrf_proof,
        bearer,
        expires_in,
    })
}

//! Identity middleware: resolves the request principal once per request.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::Extensions;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use perch_core::models::auth::User;
use tracing::debug;

use crate::AppState;
use crate::error::AppError;
use crate::middleware::carriers;
use crate::services::authenticators;

/// The credential scheme that produced a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credential {
    /// Session token (cookie or header), CSRF-checked.
    Session,
    /// API token.
    Api,
    /// Server-wide JWT.
    Server,
    /// Static admin token.
    AdminToken,
}

/// Request-scoped principal, stored in request extensions.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user: User,
    pub credential: Credential,
}

/// The principal of the request, if any.
pub fn current_user(extensions: &Extensions) -> Option<&User> {
    extensions.get::<Identity>().map(|i| &i.user)
}

/// Axum middleware: run the authenticators in order and bind the first
/// principal found. Requests without one continue anonymously.
pub async fn resolve_identity(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let headers = request.headers();
    let bearer = carriers::bearer(headers);

    let mut identity = authenticators::codec_token(state.store.as_ref(), headers).await?;
    if identity.is_none() {
        identity = authenticators::admin_token(&state, bearer.as_deref()).await?;
    }
    if identity.is_none() {
        identity = authenticators::server_jwt(&state, bearer.as_deref()).await;
    }

    if let Some(identity) = identity {
        debug!(
            user_id = identity.user.id,
            credential = ?identity.credential,
            "request principal resolved"
        );
        request.extensions_mut().insert(identity);
    }
    Ok(next.run(request).await)
}

/// Extractor for the authenticated principal; rejects with 401 when absent.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user(&parts.extensions)
            .cloned()
            .map(CurrentUser)
            .ok_or_else(AppError::unauthorized)
    }
}

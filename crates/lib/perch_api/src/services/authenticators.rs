//! Credential authenticators, tried in precedence order by the identity
//! middleware.
//!
//! Each strategy returns `Ok(None)` when it does not apply or its credential
//! does not verify, letting the next one run. `Err` aborts the request.

use axum::http::HeaderMap;
use chrono::Utc;
use perch_core::auth::AuthError;
use perch_core::auth::csrf;
use perch_core::auth::keys::constant_time_eq;
use perch_core::auth::token::{self, TokenError, TokenKind};
use perch_core::models::auth::{DEFAULT_FORGE_ID, User};
use perch_core::store::{Store, StoreError};
use tracing::{debug, error, warn};

use crate::AppState;
use crate::error::AppError;
use crate::middleware::carriers::{self, Carrier};
use crate::middleware::identity::{Credential, Identity};

/// Token kinds accepted from each carrier.
fn accepted_kinds(carrier: Carrier) -> &'static [TokenKind] {
    match carrier {
        Carrier::Header => &[TokenKind::Api, TokenKind::Session],
        Carrier::Cookie => &[TokenKind::Session],
    }
}

/// Step 1: a session or API token from the bearer carriers or the session
/// cookie. Session tokens must come with a valid CSRF proof; a bad proof
/// aborts with 401.
pub async fn codec_token(
    store: &dyn Store,
    headers: &HeaderMap,
) -> Result<Option<Identity>, AppError> {
    let Some((carrier, raw)) = carriers::codec_token(headers) else {
        return Ok(None);
    };

    let parsed = token::parse_with(
        accepted_kinds(carrier),
        &raw,
        Utc::now().timestamp(),
        |untrusted| async move {
            let id = untrusted
                .user_id()
                .ok_or_else(|| TokenError::Malformed("missing user-id claim".into()))?;
            let user = store
                .find_user_by_id(id)
                .await
                .map_err(|e| TokenError::Secret(e.to_string()))?;
            Ok::<_, TokenError>((user.hash.clone(), user))
        },
    )
    .await;

    let (token, user) = match parsed {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(?carrier, error = %e, "token not accepted");
            return Ok(None);
        }
    };

    let credential = match token.kind {
        TokenKind::Session => {
            if let Err(e) = csrf::check(carriers::csrf_proof(headers), &user.hash, user.id) {
                debug!(user_id = user.id, "csrf proof rejected");
                return Err(e.into());
            }
            Credential::Session
        }
        TokenKind::Api => Credential::Api,
    };
    Ok(Some(Identity { user, credential }))
}

/// Step 2: the static admin token.
pub async fn admin_token(
    state: &AppState,
    bearer: Option<&str>,
) -> Result<Option<Identity>, AppError> {
    let (Some(expected), Some(presented)) = (state.config.admin_token.as_deref(), bearer) else {
        return Ok(None);
    };
    if !constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
        return Ok(None);
    }
    let user =
        resolve_admin_user(state.store.as_ref(), state.config.admin_token_user.as_deref()).await?;
    Ok(Some(Identity {
        user,
        credential: Credential::AdminToken,
    }))
}

/// Resolve the admin-token login: the default forge first, then every
/// configured forge. The first match wins.
pub async fn resolve_admin_user(store: &dyn Store, login: Option<&str>) -> Result<User, AuthError> {
    let login = login.filter(|l| !l.is_empty()).ok_or_else(|| {
        AuthError::AdminTokenMisconfigured("no admin token user configured".into())
    })?;

    let mut forge_ids = vec![DEFAULT_FORGE_ID];
    forge_ids.extend(
        store
            .list_forges()
            .await?
            .into_iter()
            .map(|f| f.id)
            .filter(|id| *id != DEFAULT_FORGE_ID),
    );

    for forge_id in forge_ids {
        match store.find_user_by_login(forge_id, login).await {
            Ok(user) if user.admin => return Ok(user),
            Ok(_) => {
                return Err(AuthError::AdminTokenMisconfigured(format!(
                    "user {login} is not an admin"
                )));
            }
            Err(StoreError::NotFound) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(AuthError::AdminTokenMisconfigured(format!(
        "admin token user {login} not found"
    )))
}

/// Step 3: a server JWT from the bearer carriers. The stored login must
/// still match the token's login claim.
pub async fn server_jwt(state: &AppState, bearer: Option<&str>) -> Option<Identity> {
    let raw = bearer?;
    let claims = match state.jwt.verify(raw) {
        Ok(claims) => claims,
        Err(e) => {
            debug!(error = %e, "bearer is not a server jwt");
            return None;
        }
    };
    let user = match state.store.find_user_by_id(claims.user_id()?).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            debug!(sub = %claims.sub, "jwt subject not found");
            return None;
        }
        Err(e) => {
            error!(error = %e, "jwt subject lookup failed");
            return None;
        }
    };
    if user.login != claims.login {
        warn!(user_id = user.id, "jwt login claim does not match stored login");
        return None;
    }
    Some(Identity {
        user,
        credential: Credential::Server,
    })
}

//! Login handler.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

use crate::AppState;
use crate::models::{LoginRequest, LoginResponse};
use crate::services::cookies::{csrf_cookie, secure_request, session_cookie};
use crate::services::login;

/// `POST /api/auth/login`: authenticate with username + password.
///
/// Sets the session and CSRF cookies and returns the bearer token.
pub async fn login_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let Json(body) = match payload {
        Ok(body) => body,
        Err(e) => {
            debug!(error = %e, "login payload rejected");
            return (
                StatusCode::BAD_REQUEST,
                Json(LoginResponse::failure("invalid payload")),
            )
                .into_response();
        }
    };

    let grant = match login::login(&state, body).await {
        Ok(grant) => grant,
        Err(e) => return e.into_response(),
    };

    let secure = secure_request(state.config.cookie_secure, &headers);
    let jar = jar
        .add(session_cookie(&grant.session_token, grant.expires_in, secure))
        .add(csrf_cookie(&grant.csrf_proof, grant.expires_in, secure));
    (
        jar,
        Json(LoginResponse::success(grant.bearer, grant.expires_in)),
    )
        .into_response()
}

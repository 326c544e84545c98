//! Cookie service: build the session and CSRF cookies set at login.

use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;

/// Cookie carrying the session token. HttpOnly.
pub const SESSION_COOKIE: &str = "perch_sess";
/// Cookie carrying the CSRF proof. Readable by scripts so it can be echoed.
pub const CSRF_COOKIE: &str = "perch_csrf";

/// Whether cookies for this request should be marked `Secure`.
pub fn secure_request(always: bool, headers: &HeaderMap) -> bool {
    always
        || headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|proto| proto.eq_ignore_ascii_case("https"))
}

/// Build the HttpOnly session cookie.
pub fn session_cookie(token: &str, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE.to_string(), token.to_string()))
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::seconds(max_age_secs))
        .build()
}

/// Build the script-readable CSRF proof cookie.
pub fn csrf_cookie(proof: &str, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    Cookie::build((CSRF_COOKIE.to_string(), proof.to_string()))
        .http_only(false)
        .secure(secure)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::seconds(max_age_secs))
        .build()
}

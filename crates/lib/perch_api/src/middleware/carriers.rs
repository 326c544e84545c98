//! Credential carriers.
//!
//! Each extractor is a plain function over the request headers; none of them
//! fail, they yield `None` when the carrier is absent or malformed.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum_extra::extract::cookie::CookieJar;
use perch_core::auth::csrf::CSRF_HEADER;

use crate::services::cookies::SESSION_COOKIE;

/// Fallback header carrying a bare token.
pub const TOKEN_HEADER: &str = "x-perch-token";

/// Where a codec token was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Carrier {
    Header,
    Cookie,
}

type Extractor = fn(&HeaderMap) -> Option<String>;

/// Bearer extractors, in precedence order.
const BEARER_EXTRACTORS: [Extractor; 2] = [from_authorization, from_token_header];

/// `Authorization: Bearer <t>` or `Authorization: Token <t>`.
///
/// The scheme is case-insensitive and the value must have exactly two
/// whitespace-separated fields.
pub fn from_authorization(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let mut fields = value.split_whitespace();
    let (scheme, token) = (fields.next()?, fields.next()?);
    if fields.next().is_some() {
        return None;
    }
    if scheme.eq_ignore_ascii_case("bearer") || scheme.eq_ignore_ascii_case("token") {
        Some(token.to_string())
    } else {
        None
    }
}

/// `X-Perch-Token: <t>`.
pub fn from_token_header(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(TOKEN_HEADER)?.to_str().ok()?.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// The bearer value, from the first carrier present.
pub fn bearer(headers: &HeaderMap) -> Option<String> {
    BEARER_EXTRACTORS.iter().find_map(|extract| extract(headers))
}

/// The session cookie value.
pub fn session_cookie(headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}

/// The codec token candidate: bearer carriers first, then the session cookie.
pub fn codec_token(headers: &HeaderMap) -> Option<(Carrier, String)> {
    bearer(headers)
        .map(|t| (Carrier::Header, t))
        .or_else(|| session_cookie(headers).map(|t| (Carrier::Cookie, t)))
}

/// The client-supplied CSRF proof.
pub fn csrf_proof(headers: &HeaderMap) -> Option<&str> {
    headers.get(CSRF_HEADER)?.to_str().ok()
}

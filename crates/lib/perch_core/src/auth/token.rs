//! Signed, typed tokens bound to a per-user secret.
//!
//! Session and API tokens share one wire format: an HS256 JWT whose payload
//! carries a `type` tag, an optional `exp`, and a flat string claim set.
//!
//! Verification is two-phase. The payload is first decoded without trusting
//! it so the caller can find the secret the token claims to be signed with
//! (normally the per-user secret of the `user-id` claim); only then is the
//! signature checked against that secret, followed by expiry.

use std::collections::BTreeMap;
use std::future::Future;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Claim carrying the principal id.
pub const USER_ID_CLAIM: &str = "user-id";

/// Token type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    /// Browser session; carried by cookie and subject to CSRF checks.
    #[serde(rename = "sess")]
    Session,
    /// API / bearer token for non-browser clients.
    #[serde(rename = "user")]
    Api,
}

/// Why a token was rejected. Every variant means "invalid token" to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token missing")]
    Missing,

    #[error("token malformed: {0}")]
    Malformed(String),

    #[error("token type {0:?} not accepted")]
    KindNotAccepted(TokenKind),

    #[error("token signature invalid")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("signing secret unavailable: {0}")]
    Secret(String),

    #[error("token signing failed: {0}")]
    Signing(String),
}

/// A typed claim set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Expiry (unix seconds). `None` for tokens bounded only by the secret.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(flatten)]
    pub claims: BTreeMap<String, String>,
}

impl Token {
    /// Create an empty token of `kind`.
    pub fn new(kind: TokenKind) -> Self {
        Self {
            kind,
            exp: None,
            claims: BTreeMap::new(),
        }
    }

    /// Token of `kind` carrying the `user-id` claim.
    pub fn for_user(kind: TokenKind, user_id: i64) -> Self {
        let mut token = Self::new(kind);
        token.set(USER_ID_CLAIM, user_id.to_string());
        token
    }

    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.claims.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.claims.get(key).map(String::as_str)
    }

    /// The `user-id` claim, if present and numeric.
    pub fn user_id(&self) -> Option<i64> {
        self.get(USER_ID_CLAIM)?.parse().ok()
    }

    /// Sign without an expiry.
    pub fn sign(&self, secret: &str) -> Result<String, TokenError> {
        self.encode_with(None, secret)
    }

    /// Sign with an absolute expiry (unix seconds).
    pub fn sign_expires(&self, secret: &str, exp: i64) -> Result<String, TokenError> {
        self.encode_with(Some(exp), secret)
    }

    fn encode_with(&self, exp: Option<i64>, secret: &str) -> Result<String, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::Secret("empty signing secret".into()));
        }
        let payload = Token {
            exp,
            ..self.clone()
        };
        encode(
            &Header::new(Algorithm::HS256),
            &payload,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| TokenError::Signing(e.to_string()))
    }
}

/// Decode the payload without checking the signature or expiry.
///
/// The result must only be used to locate the verification secret.
pub fn decode_untrusted(raw: &str) -> Result<Token, TokenError> {
    let mut parts = raw.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::Malformed("expected three segments".into()));
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| TokenError::Malformed(format!("payload encoding: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| TokenError::Malformed(format!("payload: {e}")))
}

/// Verify `raw` against `secret` and check expiry at `now` (unix seconds).
pub fn verify_signed(raw: &str, secret: &str, now: i64) -> Result<Token, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::Secret("empty signing secret".into()));
    }
    let mut validation = Validation::new(Algorithm::HS256);
    // Expiry is checked below against the caller's clock, with no leeway.
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let token = decode::<Token>(raw, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            _ => TokenError::Malformed(e.to_string()),
        })?
        .claims;

    if let Some(exp) = token.exp
        && exp <= now
    {
        return Err(TokenError::Expired);
    }
    Ok(token)
}

/// Parse and verify `raw` at `now`.
///
/// `resolve` receives the untrusted token (kind and claims) and returns the
/// secret to verify the signature with.
pub fn parse_at<F>(
    accepted: &[TokenKind],
    raw: &str,
    now: i64,
    resolve: F,
) -> Result<Token, TokenError>
where
    F: FnOnce(&Token) -> Result<String, TokenError>,
{
    let untrusted = untrusted_accepted(accepted, raw)?;
    let secret = resolve(&untrusted)?;
    verify_signed(raw, &secret, now)
}

/// [`parse_at`] with the current time.
pub fn parse<F>(accepted: &[TokenKind], raw: &str, resolve: F) -> Result<Token, TokenError>
where
    F: FnOnce(&Token) -> Result<String, TokenError>,
{
    parse_at(accepted, raw, Utc::now().timestamp(), resolve)
}

/// Asynchronous variant of [`parse_at`] for resolvers that hit the store.
///
/// The resolver returns the secret together with a value of its choosing
/// (typically the loaded principal), handed back alongside the verified token.
pub async fn parse_with<F, Fut, T>(
    accepted: &[TokenKind],
    raw: &str,
    now: i64,
    resolve: F,
) -> Result<(Token, T), TokenError>
where
    F: FnOnce(Token) -> Fut,
    Fut: Future<Output = Result<(String, T), TokenError>>,
{
    let untrusted = untrusted_accepted(accepted, raw)?;
    let (secret, resolved) = resolve(untrusted).await?;
    let token = verify_signed(raw, &secret, now)?;
    Ok((token, resolved))
}

fn untrusted_accepted(accepted: &[TokenKind], raw: &str) -> Result<Token, TokenError> {
    if raw.is_empty() {
        return Err(TokenError::Missing);
    }
    let untrusted = decode_untrusted(raw)?;
    if !accepted.contains(&untrusted.kind) {
        return Err(TokenError::KindNotAccepted(untrusted.kind));
    }
    Ok(untrusted)
}

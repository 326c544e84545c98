//! Server-wide JWT bearer tokens.
//!
//! Independent of the per-user tokens in [`super::token`]: signed with one
//! process-wide secret, carry issuer/audience and a key id, and never carry a
//! `type` tag, so neither verifier accepts the other's tokens.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::AuthError;
use super::keys::generate_secret;
use super::token::TokenError;
use crate::models::auth::User;

/// Key id stamped into every server JWT header.
pub const JWT_KEY_ID: &str = "perch-jwt";

/// Lifetime used when the configured one is not positive.
const DEFAULT_TTL_SECS: i64 = 60 * 60;

/// Process-wide JWT settings.
#[derive(Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl: Duration,
}

impl std::fmt::Debug for JwtSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtSettings")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

/// Claims embedded in server JWTs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject: user id.
    pub sub: String,
    /// User login.
    pub login: String,
    /// Present (and true) only for admins.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub admin: bool,
    pub iss: String,
    pub aud: String,
    /// Expiry (unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
    pub jti: String,
}

impl JwtClaims {
    /// The subject parsed as a user id.
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// Issues and verifies server JWTs.
pub struct JwtIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl std::fmt::Debug for JwtIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtIssuer")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl JwtIssuer {
    pub fn new(settings: JwtSettings) -> Result<Self, AuthError> {
        if settings.secret.is_empty() {
            return Err(AuthError::Internal("jwt secret is empty".into()));
        }
        let ttl = if settings.ttl <= Duration::zero() {
            Duration::seconds(DEFAULT_TTL_SECS)
        } else {
            settings.ttl
        };
        Ok(Self {
            encoding_key: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.secret.as_bytes()),
            issuer: settings.issuer,
            audience: settings.audience,
            ttl,
        })
    }

    /// Effective token lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `user` (HS256, configured lifetime).
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        self.issue_at(user, Utc::now().timestamp())
    }

    pub fn issue_at(&self, user: &User, now: i64) -> Result<String, AuthError> {
        let claims = JwtClaims {
            sub: user.id.to_string(),
            login: user.login.clone(),
            admin: user.admin,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            exp: now + self.ttl.num_seconds(),
            iat: now,
            jti: Uuid::now_v7().to_string(),
        };
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(JWT_KEY_ID.to_string());
        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Verify a token, returning the claims on success.
    pub fn verify(&self, raw: &str) -> Result<JwtClaims, AuthError> {
        self.verify_at(raw, Utc::now().timestamp())
    }

    pub fn verify_at(&self, raw: &str, now: i64) -> Result<JwtClaims, AuthError> {
        if raw.is_empty() {
            return Err(TokenError::Missing.into());
        }
        let header = decode_header(raw).map_err(|e| TokenError::Malformed(e.to_string()))?;
        if header.kid.as_deref() != Some(JWT_KEY_ID) {
            return Err(TokenError::Malformed("unexpected key id".into()).into());
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let claims = decode::<JwtClaims>(raw, &self.decoding_key, &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::BadSignature,
                _ => TokenError::Malformed(e.to_string()),
            })?
            .claims;
        if claims.exp <= now {
            return Err(TokenError::Expired.into());
        }
        Ok(claims)
    }
}

/// Set-once holder for the process-wide [`JwtIssuer`].
///
/// Only the first successful [`JwtCell::configure`] takes effect; later calls
/// are no-ops so the signing secret cannot change under issued tokens.
#[derive(Debug, Default)]
pub struct JwtCell(OnceLock<JwtIssuer>);

impl JwtCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cell configured with `settings`.
    pub fn configured(settings: JwtSettings) -> Result<Self, AuthError> {
        let cell = Self::new();
        cell.configure(settings)?;
        Ok(cell)
    }

    /// Configure the issuer. Returns `Ok(true)` if this call took effect.
    pub fn configure(&self, settings: JwtSettings) -> Result<bool, AuthError> {
        if self.0.get().is_some() {
            return Ok(false);
        }
        let issuer = JwtIssuer::new(settings)?;
        Ok(self.0.set(issuer).is_ok())
    }

    pub fn get(&self) -> Option<&JwtIssuer> {
        self.0.get()
    }

    /// Issue a token, failing when the cell was never configured.
    pub fn issue(&self, user: &User) -> Result<String, AuthError> {
        self.get()
            .ok_or_else(|| AuthError::Internal("jwt not configured".into()))?
            .issue(user)
    }

    /// Verify a token, failing when the cell was never configured.
    pub fn verify(&self, raw: &str) -> Result<JwtClaims, AuthError> {
        self.get()
            .ok_or_else(|| AuthError::Internal("jwt strategy not configured".into()))?
            .verify(raw)
    }
}

/// Resolve the JWT secret: env var `PERCH_JWT_SECRET` → `JWT_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    for var in ["PERCH_JWT_SECRET", "JWT_SECRET"] {
        if let Ok(secret) = std::env::var(var)
            && !secret.is_empty()
        {
            return secret;
        }
    }
    load_or_create_secret(&jwt_secret_path())
}

/// Read the secret at `path`, generating and persisting one if absent.
pub fn load_or_create_secret(path: &Path) -> String {
    if let Ok(existing) = std::fs::read_to_string(path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret = generate_secret();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(path, &secret);
    info!(path = %path.display(), "generated new JWT secret");
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("perch")
        .join("jwt-secret")
}

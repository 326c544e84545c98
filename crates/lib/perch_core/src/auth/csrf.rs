//! CSRF proofs for session-token requests.
//!
//! The proof is `base64url(HMAC-SHA256(user secret, "csrf:" || user id))`.
//! It is derived from the same secret that signs the session token, so
//! rotating the user's secret invalidates both at once.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::AuthError;
use super::keys::constant_time_eq;

type HmacSha256 = Hmac<Sha256>;

/// Request header carrying the proof.
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Compute the proof for `user_id` under `secret`.
pub fn proof(secret: &str, user_id: i64) -> Result<String, AuthError> {
    if secret.is_empty() {
        return Err(AuthError::Internal("empty csrf secret".into()));
    }
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AuthError::Internal(format!("csrf hmac: {e}")))?;
    mac.update(format!("csrf:{user_id}").as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

/// Check a client-supplied proof.
///
/// A missing proof or any mismatch yields [`AuthError::CsrfMismatch`].
pub fn check(presented: Option<&str>, secret: &str, user_id: i64) -> Result<(), AuthError> {
    let presented = presented.map(str::trim).unwrap_or_default();
    if presented.is_empty() {
        return Err(AuthError::CsrfMismatch);
    }
    let expected = proof(secret, user_id).map_err(|_| AuthError::CsrfMismatch)?;
    if constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(AuthError::CsrfMismatch)
    }
}

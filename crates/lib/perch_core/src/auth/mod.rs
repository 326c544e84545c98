//! Authentication primitives.
//!
//! Signed tokens, CSRF proofs, password hashing and the server-wide JWT
//! issuer shared by `perch_api` and the server binary.

pub mod csrf;
pub mod jwt;
pub mod keys;
pub mod password;
pub mod token;

use thiserror::Error;

use crate::store::StoreError;
use token::TokenError;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    InvalidToken(#[from] TokenError),

    #[error("CSRF validation failed")]
    CsrfMismatch,

    #[error("Admin token misconfigured: {0}")]
    AdminTokenMisconfigured(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

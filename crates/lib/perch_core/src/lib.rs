//! # perch_core
//!
//! Core identity domain logic for Perch: signed tokens, CSRF proofs,
//! password hashing and the credential store.

pub mod auth;
pub mod models;
pub mod store;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

//! Secret generation and constant-time comparison.

use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use subtle::ConstantTimeEq;

/// Length of generated secrets.
const SECRET_LEN: usize = 64;

/// Generate a random secret (64 alphanumeric chars).
///
/// Used for per-user signing secrets and the generated JWT secret.
pub fn generate_secret() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_LEN)
        .map(char::from)
        .collect()
}

/// Compare two byte strings without leaking where they differ.
///
/// Inputs of different length compare unequal.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

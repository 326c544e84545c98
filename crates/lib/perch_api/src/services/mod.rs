//! Business logic behind the handlers.

pub mod authenticators;
pub mod cookies;
pub mod login;
pub mod users;

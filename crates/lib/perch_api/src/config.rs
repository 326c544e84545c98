//! API server configuration.

use chrono::Duration;
use perch_core::auth::jwt::{JwtSettings, resolve_jwt_secret};

/// Default session lifetime: 72 hours.
pub const DEFAULT_SESSION_EXPIRES_SECS: i64 = 72 * 60 * 60;

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8000").
    pub bind_addr: String,
    /// PostgreSQL connection URL. `None` selects the in-memory store.
    pub database_url: Option<String>,
    /// Lifetime of session tokens and their cookie.
    pub session_expires: Duration,
    /// Static admin token. `None` disables the admin-token strategy.
    pub admin_token: Option<String>,
    /// Login the admin token acts as.
    pub admin_token_user: Option<String>,
    /// Always mark auth cookies `Secure`.
    pub cookie_secure: bool,
    /// Server-wide JWT settings.
    pub jwt: JwtSettings,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable                  | Default                              |
    /// |---------------------------|--------------------------------------|
    /// | `PERCH_BIND_ADDR`         | `127.0.0.1:8000`                     |
    /// | `DATABASE_URL`            | unset (in-memory store)              |
    /// | `PERCH_SESSION_EXPIRES`   | `259200` seconds (72h)               |
    /// | `PERCH_ADMIN_TOKEN`       | unset                                |
    /// | `PERCH_ADMIN_TOKEN_USER`  | unset                                |
    /// | `PERCH_COOKIE_SECURE`     | `false`                              |
    /// | `PERCH_JWT_SECRET` / `JWT_SECRET` | generated & persisted to file |
    /// | `PERCH_JWT_ISSUER`        | `perch`                              |
    /// | `PERCH_JWT_AUDIENCE`      | `perch-api`                          |
    /// | `PERCH_JWT_TTL`           | session lifetime                     |
    pub fn from_env() -> Self {
        let session_expires = env_seconds("PERCH_SESSION_EXPIRES")
            .unwrap_or(Duration::seconds(DEFAULT_SESSION_EXPIRES_SECS));
        Self {
            bind_addr: std::env::var("PERCH_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8000".into()),
            database_url: env_non_empty("DATABASE_URL"),
            session_expires,
            admin_token: env_non_empty("PERCH_ADMIN_TOKEN"),
            admin_token_user: env_non_empty("PERCH_ADMIN_TOKEN_USER"),
            cookie_secure: std::env::var("PERCH_COOKIE_SECURE")
                .map(|v| parse_bool(&v))
                .unwrap_or(false),
            jwt: JwtSettings {
                secret: resolve_jwt_secret(),
                issuer: env_non_empty("PERCH_JWT_ISSUER").unwrap_or_else(|| "perch".into()),
                audience: env_non_empty("PERCH_JWT_AUDIENCE")
                    .unwrap_or_else(|| "perch-api".into()),
                ttl: env_seconds("PERCH_JWT_TTL").unwrap_or(session_expires),
            },
        }
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_seconds(name: &str) -> Option<Duration> {
    env_non_empty(name).and_then(|v| parse_seconds(&v))
}

/// Parse a positive number of seconds.
fn parse_seconds(value: &str) -> Option<Duration> {
    value
        .parse::<i64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::seconds)
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_must_be_positive_integers() {
        assert_eq!(parse_seconds("3600"), Some(Duration::hours(1)));
        assert_eq!(parse_seconds("0"), None);
        assert_eq!(parse_seconds("-5"), None);
        assert_eq!(parse_seconds("72h"), None);
    }

    #[test]
    fn bool_flags() {
        for v in ["1", "true", "TRUE", " yes ", "on"] {
            assert!(parse_bool(v), "{v}");
        }
        for v in ["", "0", "false", "nope"] {
            assert!(!parse_bool(v), "{v}");
        }
    }
}

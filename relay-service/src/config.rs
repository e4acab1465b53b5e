//! Configuration module for environment variable parsing.

use std::env;
use std::time::Duration;

use tracing::warn;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// PostgreSQL connection URL; `None` selects the in-memory store
    pub database_url: Option<String>,

    /// Maximum pooled database connections
    pub db_max_connections: u32,

    /// Deadline for the forward request to a tenant endpoint
    pub forward_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            port: parse_or("PORT", 3014),

            database_url: database_url(),

            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10),

            forward_timeout_ms: parse_or("FORWARD_TIMEOUT_MS", 10_000),
        }
    }

    pub fn forward_timeout(&self) -> Duration {
        Duration::from_millis(self.forward_timeout_ms)
    }
}

/// `DATABASE_URL`, or a URL assembled from the `DB_*` component variables
/// when `DB_HOST` is set.
fn database_url() -> Option<String> {
    if let Some(url) = non_empty_var("DATABASE_URL") {
        return Some(url);
    }

    let host = non_empty_var("DB_HOST")?;
    let port: u16 = parse_or("DB_PORT", 5432);
    let name = non_empty_var("DB_NAME").unwrap_or_else(|| "postgres".to_string());
    let user = non_empty_var("DB_USER").unwrap_or_else(|| "postgres".to_string());

    let mut url = url::Url::parse(&format!("postgres://{host}:{port}/")).ok().or_else(|| {
        warn!(env_var = "DB_HOST", value = %host, "Invalid database host, ignoring");
        None
    })?;
    url.set_path(&name);
    // set_username/set_password only fail for cannot-be-a-base URLs
    let _ = url.set_username(&user);
    if let Some(password) = non_empty_var("DB_PASSWORD") {
        let _ = url.set_password(Some(&password));
    }

    Some(url.to_string())
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, falling back to `default` when it is
/// unset or invalid.
fn parse_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_or_valid() {
        env::set_var("TEST_RELAY_PORT", "8081");
        assert_eq!(parse_or::<u16>("TEST_RELAY_PORT", 1), 8081);
        env::remove_var("TEST_RELAY_PORT");
    }

    #[test]
    fn test_parse_or_invalid_uses_default() {
        env::set_var("TEST_RELAY_TIMEOUT", "soon");
        assert_eq!(parse_or::<u64>("TEST_RELAY_TIMEOUT", 250), 250);
        env::remove_var("TEST_RELAY_TIMEOUT");
    }

    #[test]
    fn test_parse_or_default() {
        assert_eq!(parse_or::<u32>("NONEXISTENT_RELAY_VAR", 10), 10);
    }

    #[test]
    fn test_forward_timeout() {
        let config = Config {
            port: 3014,
            database_url: None,
            db_max_connections: 10,
            forward_timeout_ms: 1500,
        };
        assert_eq!(config.forward_timeout(), Duration::from_millis(1500));
    }
}

//! Application configuration loaded from environment variables.
//!
//! Only `DATABASE_URL` is mandatory; everything else falls back to a local
//! development default.

use std::time::Duration;

use tracing::warn;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// SQLite connection string.
    /// Env: `DATABASE_URL`
    pub database_url: String,

    /// Env: `HOST`
    /// Default: `127.0.0.1`
    pub host: String,

    /// Preferred HTTP port; the server tries `port + 1` if it is taken.
    /// Env: `PORT`
    /// Default: `3000`
    pub port: u16,

    /// Env: `DATABASE_MAX_CONNECTIONS`
    /// Default: `8`
    pub database_max_connections: u32,

    /// Origin allowed by CORS.
    /// Env: `FRONTEND_URL`
    /// Default: `http://localhost:3000`
    pub frontend_url: String,

    /// Base URL of the chat backend. Chat is disabled when unset.
    /// Env: `CHAT_API_URL`
    pub chat_api_url: Option<String>,

    /// Server-side API key for the chat backend.
    /// Env: `CHAT_API_KEY`
    pub chat_api_key: Option<String>,

    /// Host header to send when the chat backend sits behind a shared ingress.
    /// Env: `CHAT_API_HOST`
    pub chat_api_host: Option<String>,

    /// Upper bound for a single chat call.
    /// Env: `CHAT_TIMEOUT_MS`
    /// Default: `3000`
    pub chat_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
}

impl AppConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            database_max_connections: 8,
            frontend_url: "http://localhost:3000".to_string(),
            chat_api_url: None,
            chat_api_key: None,
            chat_api_host: None,
            chat_timeout: Duration::from_millis(3000),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url =
            non_empty(lookup("DATABASE_URL")).ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let mut config = Self::new(database_url);

        if let Some(host) = non_empty(lookup("HOST")) {
            config.host = host;
        }

        if let Some(raw) = lookup("PORT") {
            match raw.trim().parse::<u16>() {
                Ok(port) => config.port = port,
                Err(_) => warn!(value = %raw, "Invalid PORT, using default"),
            }
        }

        if let Some(raw) = lookup("DATABASE_MAX_CONNECTIONS") {
            match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => config.database_max_connections = n,
                _ => warn!(value = %raw, "Invalid DATABASE_MAX_CONNECTIONS, using default"),
            }
        }

        if let Some(url) = non_empty(lookup("FRONTEND_URL")) {
            config.frontend_url = url;
        }

        config.chat_api_url = non_empty(lookup("CHAT_API_URL"));
        config.chat_api_key = non_empty(lookup("CHAT_API_KEY"));
        config.chat_api_host = non_empty(lookup("CHAT_API_HOST"));

        if let Some(raw) = lookup("CHAT_TIMEOUT_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.chat_timeout = Duration::from_millis(ms),
                _ => warn!(value = %raw, "Invalid CHAT_TIMEOUT_MS, using default"),
            }
        }

        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_database_url_is_required() {
        let err = AppConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup_from(&[("DATABASE_URL", "sqlite://app.db")])).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_max_connections, 8);
        assert!(config.chat_api_url.is_none());
        assert_eq!(config.chat_timeout, Duration::from_millis(3000));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite://app.db"),
            ("PORT", "not-a-port"),
            ("DATABASE_MAX_CONNECTIONS", "0"),
            ("CHAT_TIMEOUT_MS", "-5"),
            ("CHAT_API_URL", "   "),
        ]))
        .unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.database_max_connections, 8);
        assert_eq!(config.chat_timeout, Duration::from_millis(3000));
        assert!(config.chat_api_url.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite://app.db"),
            ("HOST", "0.0.0.0"),
            ("PORT", "8081"),
            ("CHAT_API_URL", "http://chat.localhost:8080"),
            ("CHAT_API_KEY", "secret"),
            ("CHAT_TIMEOUT_MS", "250"),
        ]))
        .unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8081);
        assert_eq!(config.chat_api_url.as_deref(), Some("http://chat.localhost:8080"));
        assert_eq!(config.chat_api_key.as_deref(), Some("secret"));
        assert_eq!(config.chat_timeout, Duration::from_millis(250));
    }
}

use std::fmt::Display;
use std::str::FromStr;

use axum::http::HeaderValue;
use stormhead_db::FingerprintPolicy;

use crate::auth::token::JwtConfig;

/// A required variable is absent or a present one does not parse.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{var}={value:?} is invalid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for local
/// development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long in-flight requests may drain after a shutdown signal (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Whether a second login from the same fingerprint is refused.
    pub fingerprint_policy: FingerprintPolicy,
    /// How often idle sessions are purged (default: `3600`).
    pub session_retention_interval_secs: u64,
    /// Token signing and lifetimes.
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                 |
    /// |----------------------------------|-------------------------|
    /// | `HOST`                           | `0.0.0.0`               |
    /// | `PORT`                           | `3000`                  |
    /// | `CORS_ORIGINS`                   | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`           | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`          | `30`                    |
    /// | `SESSION_FINGERPRINT_POLICY`     | `allow`                 |
    /// | `SESSION_RETENTION_INTERVAL_SECS`| `3600`                  |
    ///
    /// See [`JwtConfig::from_env`] for the token variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = env_or(&lookup, "PORT", 3000u16)?;

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        if let Some(bad) = cors_origins
            .iter()
            .find(|o| HeaderValue::from_str(o).is_err())
        {
            return Err(ConfigError::Invalid {
                var: "CORS_ORIGINS",
                value: bad.clone(),
                reason: "not a valid header value".into(),
            });
        }

        let request_timeout_secs = env_or(&lookup, "REQUEST_TIMEOUT_SECS", 30u64)?;
        let shutdown_timeout_secs = env_or(&lookup, "SHUTDOWN_TIMEOUT_SECS", 30u64)?;
        let fingerprint_policy =
            env_or(&lookup, "SESSION_FINGERPRINT_POLICY", FingerprintPolicy::Allow)?;
        let session_retention_interval_secs =
            env_or(&lookup, "SESSION_RETENTION_INTERVAL_SECS", 3600u64)?;

        if session_retention_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "SESSION_RETENTION_INTERVAL_SECS",
                value: "0".into(),
                reason: "must be positive".into(),
            });
        }

        let jwt = JwtConfig::from_lookup(&lookup)?;

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            fingerprint_policy,
            session_retention_interval_secs,
            jwt,
        })
    }
}

/// Parse `var` if set, otherwise fall back to `default`.
pub(crate) fn env_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
    }
}

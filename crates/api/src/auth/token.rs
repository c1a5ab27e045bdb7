//! Access and refresh token minting and verification.
//!
//! Both kinds are HS256-signed JWTs carrying a [`Claims`] payload that binds
//! them to a session. A token being valid here says nothing about whether its
//! session still exists; the session gate checks that separately.

use std::fmt;
use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use stormhead_core::clock::Clock;
use stormhead_core::types::SessionId;

use crate::config::{env_or, ConfigError};

/// The only algorithm tokens are signed or accepted with.
const ALGORITHM: Algorithm = Algorithm::HS256;

/// Default access token expiry in minutes.
const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 15;
/// Default refresh token expiry in days.
const DEFAULT_REFRESH_EXPIRY_DAYS: i64 = 7;

/// Discriminates access tokens from refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

/// Claims embedded in every token. Unknown fields are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Claims {
    pub session_id: SessionId,
    pub kind: TokenKind,
    /// Expiration time (UTC Unix timestamp).
    pub expiration: i64,
}

/// Why a token was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token signature is invalid")]
    SignatureInvalid,

    #[error("token claims are malformed")]
    ClaimsMalformed,

    #[error("expected a {expected} token, got a {actual} token")]
    KindMismatch { expected: TokenKind, actual: TokenKind },

    #[error("token has expired")]
    Expired,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

/// Configuration for token signing and lifetimes.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HMAC-SHA256 secret used to sign and verify tokens.
    pub secret: String,
    pub access_token_expiry_mins: i64,
    pub refresh_token_expiry_days: i64,
}

impl JwtConfig {
    /// Load JWT configuration from environment variables.
    ///
    /// | Env Var                    | Required | Default |
    /// |----------------------------|----------|---------|
    /// | `JWT_SECRET`               | **yes**  | --      |
    /// | `JWT_ACCESS_EXPIRY_MINS`   | no       | `15`    |
    /// | `JWT_REFRESH_EXPIRY_DAYS`  | no       | `7`     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let access_token_expiry_mins =
            env_or(&lookup, "JWT_ACCESS_EXPIRY_MINS", DEFAULT_ACCESS_EXPIRY_MINS)?;
        let refresh_token_expiry_days =
            env_or(&lookup, "JWT_REFRESH_EXPIRY_DAYS", DEFAULT_REFRESH_EXPIRY_DAYS)?;

        for (var, value) in [
            ("JWT_ACCESS_EXPIRY_MINS", access_token_expiry_mins),
            ("JWT_REFRESH_EXPIRY_DAYS", refresh_token_expiry_days),
        ] {
            if value <= 0 {
                return Err(ConfigError::Invalid {
                    var,
                    value: value.to_string(),
                    reason: "must be positive".into(),
                });
            }
        }

        Ok(Self {
            secret,
            access_token_expiry_mins,
            refresh_token_expiry_days,
        })
    }

    pub fn access_token_ttl(&self) -> Duration {
        Duration::minutes(self.access_token_expiry_mins)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::days(self.refresh_token_expiry_days)
    }
}

/// A freshly minted access/refresh pair for one session.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Mints and verifies tokens. Holds no mutable state.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(config: &JwtConfig, clock: Arc<dyn Clock>) -> Self {
        // Expiry is checked against the injected clock, not by the library.
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims.clear();

        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            access_ttl: config.access_token_ttl(),
            refresh_ttl: config.refresh_token_ttl(),
            clock,
        }
    }

    /// Access token lifetime, reported to clients as `expires_in`.
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn generate_access_token(&self, session_id: SessionId) -> Result<String, TokenError> {
        self.generate(session_id, TokenKind::Access)
    }

    pub fn generate_refresh_token(&self, session_id: SessionId) -> Result<String, TokenError> {
        self.generate(session_id, TokenKind::Refresh)
    }

    pub fn generate_pair(&self, session_id: SessionId) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.generate_access_token(session_id)?,
            refresh_token: self.generate_refresh_token(session_id)?,
        })
    }

    pub fn parse_access_token(&self, token: &str) -> Result<SessionId, TokenError> {
        self.parse(token, TokenKind::Access)
    }

    pub fn parse_refresh_token(&self, token: &str) -> Result<SessionId, TokenError> {
        self.parse(token, TokenKind::Refresh)
    }

    fn generate(&self, session_id: SessionId, kind: TokenKind) -> Result<String, TokenError> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let claims = Claims {
            session_id,
            kind,
            expiration: (self.clock.now() + ttl).timestamp(),
        };

        encode(&Header::new(ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Checks, in order: algorithm and signature, claim shape, kind, expiry.
    fn parse(&self, token: &str, expected: TokenKind) -> Result<SessionId, TokenError> {
        let header = decode_header(token).map_err(|_| TokenError::SignatureInvalid)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::SignatureInvalid);
        }

        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::Json(_) | ErrorKind::Utf8(_) | ErrorKind::MissingRequiredClaim(_) => {
                    TokenError::ClaimsMalformed
                }
                _ => TokenError::SignatureInvalid,
            })?
            .claims;

        if claims.kind != expected {
            return Err(TokenError::KindMismatch {
                expected,
                actual: claims.kind,
            });
        }

        if claims.expiration <= self.clock.now().timestamp() {
            return Err(TokenError::Expired);
        }

        Ok(claims.session_id)
    }
}

//! Signed bearer token codec.
//!
//! Two independent signing domains exist: `access` (short-lived) and
//! `refresh` (long-lived), each with its own secret and lifetime. The kind is
//! deliberately not a payload field: a refresh token decoded with the access
//! secret fails signature verification, which is the rejection mechanism.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use filmgate_core::{TokenId, UserId};

use crate::claims::TokenClaims;

/// Token kind, selecting the signing domain and lifetime.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl core::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            TokenKind::Access => f.write_str("access"),
            TokenKind::Refresh => f.write_str("refresh"),
        }
    }
}

/// Codec configuration (secrets and lifetimes per kind).
#[derive(Debug, Clone)]
pub struct CodecConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_lifetime_hours: i64,
    pub refresh_lifetime_hours: i64,
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to sign token")]
    Sign(#[source] jsonwebtoken::errors::Error),
}

/// Decode failure, collapsed to two categories.
///
/// Callers must map either variant to "unauthenticated" and never surface
/// which check failed to the client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("token has expired")]
    Expired,

    #[error("token is malformed or its signature does not verify")]
    Invalid,
}

impl From<jsonwebtoken::errors::Error> for DecodeError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => DecodeError::Expired,
            _ => DecodeError::Invalid,
        }
    }
}

struct SigningDomain {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl SigningDomain {
    fn new(secret: &str, lifetime_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime: Duration::hours(lifetime_hours),
        }
    }
}

/// Encodes and decodes signed, expiring bearer tokens (HS256).
pub struct TokenCodec {
    access: SigningDomain,
    refresh: SigningDomain,
}

impl TokenCodec {
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            access: SigningDomain::new(&config.access_secret, config.access_lifetime_hours),
            refresh: SigningDomain::new(&config.refresh_secret, config.refresh_lifetime_hours),
        }
    }

    fn domain(&self, kind: TokenKind) -> &SigningDomain {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Lifetime configured for `kind`.
    pub fn lifetime(&self, kind: TokenKind) -> Duration {
        self.domain(kind).lifetime
    }

    /// Issue a signed token of `kind` for `user` with the given role snapshot.
    ///
    /// The payload is `{user, roles, lat, exp, jti}` with unix-second
    /// timestamps and a fresh `jti`.
    pub fn issue(
        &self,
        user: UserId,
        roles: Vec<String>,
        kind: TokenKind,
    ) -> Result<String, EncodeError> {
        self.issue_at(user, roles, kind, Utc::now())
    }

    fn issue_at(
        &self,
        user: UserId,
        roles: Vec<String>,
        kind: TokenKind,
        now: DateTime<Utc>,
    ) -> Result<String, EncodeError> {
        let domain = self.domain(kind);
        let claims = TokenClaims {
            user,
            roles,
            lat: now.timestamp(),
            exp: (now + domain.lifetime).timestamp(),
            jti: TokenId::new(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &domain.encoding)
            .map_err(EncodeError::Sign)
    }

    /// Decode and verify a token against `kind`'s secret.
    ///
    /// Rejects bad signatures, malformed structure and expired tokens. A
    /// token issued under the other kind fails here with
    /// [`DecodeError::Invalid`].
    pub fn decode(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, DecodeError> {
        let domain = self.domain(kind);
        let validation = Validation::new(Algorithm::HS256);
        let data = jsonwebtoken::decode::<TokenClaims>(token, &domain.decoding, &validation)?;
        Ok(data.claims)
    }
}

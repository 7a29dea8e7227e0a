//! Token registry: current token pairs and revoked token identifiers.
//!
//! The registry tracks, per user, the most recently issued access/refresh
//! pair plus a set of revoked `jti` markers. Every operation is a call to an
//! external key-value store; unavailability is a hard failure for callers,
//! since treating it as "not revoked" / "not current" would fail open.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use filmgate_core::{TokenId, UserId};

mod in_memory;
mod redis;

pub use in_memory::InMemoryTokenRegistry;
pub use redis::RedisTokenRegistry;

/// Entry lifetimes, matching the configured token lifetimes.
#[derive(Debug, Copy, Clone)]
pub struct TokenTtls {
    pub access: Duration,
    pub refresh: Duration,
}

impl TokenTtls {
    pub fn from_hours(access_hours: u64, refresh_hours: u64) -> Self {
        Self {
            access: Duration::from_secs(access_hours * 3600),
            refresh: Duration::from_secs(refresh_hours * 3600),
        }
    }

    /// TTL for revocation markers.
    ///
    /// A marker must outlive the token it blocks, so it gets the longest
    /// configured lifetime.
    pub fn revocation(&self) -> Duration {
        self.access.max(self.refresh)
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("token registry unavailable: {0}")]
    Unavailable(String),
}

impl From<::redis::RedisError> for RegistryError {
    fn from(err: ::redis::RedisError) -> Self {
        RegistryError::Unavailable(err.to_string())
    }
}

/// Keyed, TTL-bearing store of current tokens and revocation markers.
#[async_trait]
pub trait TokenRegistry: Send + Sync {
    /// Record a freshly issued pair for `user_id`, overwriting any previous
    /// pair (last write wins). The access entry expires with the access
    /// lifetime, the refresh entry with the refresh lifetime.
    async fn save_pair(
        &self,
        user_id: UserId,
        access: &str,
        refresh: &str,
    ) -> Result<(), RegistryError>;

    /// Re-save just the current access entry (used on refresh so the
    /// registry keeps tracking the newest issued access token).
    async fn save_access(&self, user_id: UserId, access: &str) -> Result<(), RegistryError>;

    /// Insert a revocation marker for `jti`. When `user_id` is given, also
    /// drop that user's current access/refresh entries for immediate
    /// de-authentication.
    async fn mark_revoked(
        &self,
        jti: TokenId,
        user_id: Option<UserId>,
    ) -> Result<(), RegistryError>;

    /// Existence check of the revocation marker for `jti`.
    async fn is_revoked(&self, jti: TokenId) -> Result<bool, RegistryError>;

    /// Whether `refresh` equals the stored current refresh entry. A
    /// superseded-but-unexpired refresh token fails this check.
    async fn is_refresh_current(
        &self,
        user_id: UserId,
        refresh: &str,
    ) -> Result<bool, RegistryError>;

    /// The stored current refresh token, if any.
    async fn current_refresh(&self, user_id: UserId) -> Result<Option<String>, RegistryError>;

    /// The stored current access token, if any.
    async fn current_access(&self, user_id: UserId) -> Result<Option<String>, RegistryError>;
}

pub(crate) fn access_key(user_id: UserId) -> String {
    format!("accessToken_{user_id}")
}

pub(crate) fn refresh_key(user_id: UserId) -> String {
    format!("refreshToken_{user_id}")
}

pub(crate) fn block_key(jti: TokenId) -> String {
    format!("jtiBlock_{jti}")
}

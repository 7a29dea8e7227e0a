//! Session lifecycle: login, logout, refresh, compromise propagation.
//!
//! One session pair (access, refresh) is tracked per user; a new login
//! overwrites the previous pair. Logout and role mutations revoke both jtis
//! of the tracked pair, not just the token that happened to be presented.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use filmgate_auth::{self as auth, EncodeError, TokenClaims, TokenCodec, TokenKind};
use filmgate_core::UserId;
use filmgate_infra::{
    DeviceKind, IdentityStore, LoginRecord, RegistryError, StoreError, TokenRegistry, UserRecord,
};

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct IssuedPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("user not found")]
    UserNotFound,

    #[error("wrong password")]
    WrongPassword,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Orchestrates the session state machine (`absent -> active -> revoked`)
/// over the codec, the registry and the identity store.
#[derive(Clone)]
pub struct SessionService {
    codec: Arc<TokenCodec>,
    registry: Arc<dyn TokenRegistry>,
    identities: Arc<dyn IdentityStore>,
}

impl SessionService {
    pub fn new(
        codec: Arc<TokenCodec>,
        registry: Arc<dyn TokenRegistry>,
        identities: Arc<dyn IdentityStore>,
    ) -> Self {
        Self {
            codec,
            registry,
            identities,
        }
    }

    /// Verify the credential and open a session.
    ///
    /// On success the pair is tracked in the registry (superseding any prior
    /// pair) and a login-history record is appended. A failed credential
    /// check mutates nothing.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        user_agent: &str,
    ) -> Result<IssuedPair, SessionError> {
        let user = self
            .identities
            .user_by_email(email)
            .await?
            .ok_or(SessionError::UserNotFound)?;

        if !auth::verify_password(&user.password_hash, password) {
            return Err(SessionError::WrongPassword);
        }

        let roles = user.role_names();
        let access_token = self.codec.issue(user.id, roles.clone(), TokenKind::Access)?;
        let refresh_token = self.codec.issue(user.id, roles, TokenKind::Refresh)?;

        self.registry
            .save_pair(user.id, &access_token, &refresh_token)
            .await?;

        self.identities
            .record_login(LoginRecord {
                user_id: user.id,
                date: Utc::now(),
                user_agent: user_agent.to_string(),
                device: DeviceKind::classify(user_agent),
            })
            .await?;

        tracing::info!(user_id = %user.id, "session opened");
        Ok(IssuedPair {
            access_token,
            refresh_token,
        })
    }

    /// Close the session behind the presented access token.
    ///
    /// Revokes the presented jti, then the tracked refresh token's jti, and
    /// drops both registry entries. A missing or undecodable stored refresh
    /// token still results in the pair entries being dropped.
    pub async fn logout(&self, claims: &TokenClaims) -> Result<(), SessionError> {
        self.registry.mark_revoked(claims.jti, None).await?;

        let stored = self.registry.current_refresh(claims.user).await?;
        let refresh_jti = stored
            .and_then(|token| self.codec.decode(&token, TokenKind::Refresh).ok())
            .map(|c| c.jti);

        // Either way the user's tracked pair is dropped; the second marker
        // only exists when the stored refresh token was readable.
        self.registry
            .mark_revoked(refresh_jti.unwrap_or(claims.jti), Some(claims.user))
            .await?;

        tracing::info!(user_id = %claims.user, "session closed");
        Ok(())
    }

    /// Issue a new access token against a valid, current refresh token.
    ///
    /// The refresh token is not rotated. The registry's access entry is
    /// re-saved so "current access" tracks the newest issued token. Roles
    /// are re-read from the identity record, so a refresh picks up role
    /// changes that happened since issuance.
    pub async fn refresh(&self, identity: &UserRecord) -> Result<String, SessionError> {
        let access_token =
            self.codec
                .issue(identity.id, identity.role_names(), TokenKind::Access)?;

        self.registry
            .save_access(identity.id, &access_token)
            .await?;

        Ok(access_token)
    }

    /// Revoke whatever pair the registry currently tracks for `user_id`.
    ///
    /// Called on every role mutation so the payload-embedded role snapshot
    /// cannot outlive the change; the user must log in again and gets a
    /// fresh snapshot.
    pub async fn invalidate_sessions(&self, user_id: UserId) -> Result<(), SessionError> {
        let tracked = [
            (
                self.registry.current_access(user_id).await?,
                TokenKind::Access,
            ),
            (
                self.registry.current_refresh(user_id).await?,
                TokenKind::Refresh,
            ),
        ];

        let mut revoked = 0usize;
        for (token, kind) in tracked {
            let Some(token) = token else { continue };
            if let Ok(claims) = self.codec.decode(&token, kind) {
                self.registry.mark_revoked(claims.jti, Some(user_id)).await?;
                revoked += 1;
            }
        }

        if revoked > 0 {
            tracing::info!(user_id = %user_id, revoked, "sessions invalidated");
        }
        Ok(())
    }
}

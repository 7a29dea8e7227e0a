//! Redis-backed token registry.
//!
//! Key scheme: `accessToken_{user_id}`, `refreshToken_{user_id}` for current
//! pairs, `jtiBlock_{jti}` for revocation markers. All entries carry a TTL;
//! nothing in the registry lives longer than the longest token lifetime.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::instrument;

use filmgate_core::{TokenId, UserId};

use super::{access_key, block_key, refresh_key, RegistryError, TokenRegistry, TokenTtls};

/// Token registry over a shared async Redis connection.
#[derive(Clone)]
pub struct RedisTokenRegistry {
    conn: ConnectionManager,
    ttls: TokenTtls,
}

impl RedisTokenRegistry {
    /// Connect to Redis at `url`.
    ///
    /// The connection manager reconnects on failure; individual commands
    /// still surface errors, which callers must treat as rejections.
    pub async fn connect(url: &str, ttls: TokenTtls) -> Result<Self, RegistryError> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn, ttls })
    }
}

#[async_trait::async_trait]
impl TokenRegistry for RedisTokenRegistry {
    #[instrument(skip(self, access, refresh), fields(user_id = %user_id), err)]
    async fn save_pair(
        &self,
        user_id: UserId,
        access: &str,
        refresh: &str,
    ) -> Result<(), RegistryError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(access_key(user_id), access, self.ttls.access.as_secs())
            .await?;
        let _: () = conn
            .set_ex(refresh_key(user_id), refresh, self.ttls.refresh.as_secs())
            .await?;
        Ok(())
    }

    #[instrument(skip(self, access), fields(user_id = %user_id), err)]
    async fn save_access(&self, user_id: UserId, access: &str) -> Result<(), RegistryError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(access_key(user_id), access, self.ttls.access.as_secs())
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(jti = %jti), err)]
    async fn mark_revoked(
        &self,
        jti: TokenId,
        user_id: Option<UserId>,
    ) -> Result<(), RegistryError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(block_key(jti), "", self.ttls.revocation().as_secs())
            .await?;

        if let Some(user_id) = user_id {
            let _: i64 = conn
                .del(vec![access_key(user_id), refresh_key(user_id)])
                .await?;
        }
        Ok(())
    }

    async fn is_revoked(&self, jti: TokenId) -> Result<bool, RegistryError> {
        let mut conn = self.conn.clone();
        Ok(conn.exists(block_key(jti)).await?)
    }

    async fn is_refresh_current(
        &self,
        user_id: UserId,
        refresh: &str,
    ) -> Result<bool, RegistryError> {
        let stored = self.current_refresh(user_id).await?;
        Ok(stored.as_deref() == Some(refresh))
    }

    async fn current_refresh(&self, user_id: UserId) -> Result<Option<String>, RegistryError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(refresh_key(user_id)).await?)
    }

    async fn current_access(&self, user_id: UserId) -> Result<Option<String>, RegistryError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(access_key(user_id)).await?)
    }
}

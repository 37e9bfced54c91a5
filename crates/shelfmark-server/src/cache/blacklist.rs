//! Cache-backed token blacklist.
//!
//! Revocation writes the raw token string under a namespaced key whose TTL
//! equals the token's remaining lifetime; the entry disappears exactly when
//! the token itself would have expired.

use std::time::Duration;

use async_trait::async_trait;

use shelfmark_auth::AuthResult;
use shelfmark_auth::storage::TokenBlacklist;

use super::backend::CacheBackend;
use super::keys;

/// Token blacklist over the cache backend.
pub struct CacheTokenBlacklist {
    cache: CacheBackend,
}

impl CacheTokenBlacklist {
    #[must_use]
    pub fn new(cache: CacheBackend) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl TokenBlacklist for CacheTokenBlacklist {
    async fn revoke(&self, token: &str, ttl: Duration) -> AuthResult<()> {
        self.cache
            .set(&keys::blacklist_key(token), b"1".to_vec(), ttl)
            .await;
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> AuthResult<bool> {
        Ok(self.cache.exists(&keys::blacklist_key(token)).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_revoke_and_check() {
        let blacklist = CacheTokenBlacklist::new(CacheBackend::new_local());
        assert!(!blacklist.is_revoked("token-a").await.unwrap());

        blacklist
            .revoke("token-a", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(blacklist.is_revoked("token-a").await.unwrap());
        assert!(!blacklist.is_revoked("token-b").await.unwrap());
    }

    #[tokio::test]
    async fn test_entry_expires_with_token() {
        let blacklist = CacheTokenBlacklist::new(CacheBackend::new_local());
        blacklist
            .revoke("token-a", Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blacklist.is_revoked("token-a").await.unwrap());
    }
}

//! Cache-backed session store.
//!
//! Sessions and the per-user session-id index live in the cache with the
//! same TTL; natural expiry handles the "expired" state, so the store only
//! distinguishes present from absent. The index is kept consistent with
//! individual deletes: removing the last session deletes the index key
//! rather than leaving an empty list behind.

use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use shelfmark_auth::AuthResult;
use shelfmark_auth::storage::{ClientContext, SessionData, SessionStore};
use shelfmark_core::User;

use super::backend::CacheBackend;
use super::keys;

/// Session store over the cache backend.
///
/// Every operation inherits the backend's degrade-to-miss contract, so
/// session bookkeeping can never fail a request.
pub struct CacheSessionStore {
    cache: CacheBackend,
    ttl: Duration,
}

impl CacheSessionStore {
    /// Creates a store with the given session TTL.
    #[must_use]
    pub fn new(cache: CacheBackend, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    async fn session_ids(&self, user_id: Uuid) -> Vec<String> {
        self.cache
            .get_json(&keys::user_sessions_key(user_id))
            .await
            .unwrap_or_default()
    }

    async fn write_session_ids(&self, user_id: Uuid, ids: &[String]) {
        let key = keys::user_sessions_key(user_id);
        if ids.is_empty() {
            self.cache.delete(&key).await;
        } else {
            self.cache.set_json(&key, &ids, self.ttl).await;
        }
    }
}

#[async_trait]
impl SessionStore for CacheSessionStore {
    async fn create(&self, user: &User, client: ClientContext) -> AuthResult<String> {
        let now = OffsetDateTime::now_utc();
        let session = SessionData {
            id: Uuid::new_v4().to_string(),
            user_id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            is_admin: user.is_admin,
            ip: client.ip,
            user_agent: client.user_agent,
            created_at: now,
            last_activity: now,
        };

        self.cache
            .set_json(&keys::session_key(&session.id), &session, self.ttl)
            .await;

        let mut ids = self.session_ids(user.id).await;
        ids.push(session.id.clone());
        self.write_session_ids(user.id, &ids).await;

        tracing::debug!(user_id = %user.id, sid = %session.id, "Session created");
        Ok(session.id)
    }

    async fn get(&self, session_id: &str) -> AuthResult<Option<SessionData>> {
        Ok(self.cache.get_json(&keys::session_key(session_id)).await)
    }

    async fn touch(&self, session_id: &str) -> AuthResult<bool> {
        let key = keys::session_key(session_id);
        let Some(mut session) = self.cache.get_json::<SessionData>(&key).await else {
            return Ok(false);
        };
        session.last_activity = OffsetDateTime::now_utc();
        self.cache.set_json(&key, &session, self.ttl).await;
        Ok(true)
    }

    async fn destroy(&self, session_id: &str) -> AuthResult<bool> {
        let key = keys::session_key(session_id);
        let session = self.cache.get_json::<SessionData>(&key).await;
        let existed = self.cache.delete(&key).await;

        if let Some(session) = session {
            let mut ids = self.session_ids(session.user_id).await;
            ids.retain(|id| id != session_id);
            self.write_session_ids(session.user_id, &ids).await;
        }

        tracing::debug!(sid = %session_id, existed, "Session destroyed");
        Ok(existed)
    }

    async fn destroy_all_for_user(&self, user_id: Uuid) -> AuthResult<u64> {
        let ids = self.session_ids(user_id).await;
        let mut destroyed = 0;
        for id in &ids {
            if self.cache.delete(&keys::session_key(id)).await {
                destroyed += 1;
            }
        }
        self.cache.delete(&keys::user_sessions_key(user_id)).await;

        tracing::debug!(user_id = %user_id, destroyed, "All sessions destroyed");
        Ok(destroyed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            name: "Reader".to_string(),
            email: "reader@example.com".to_string(),
            password_hash: "$argon2id$...".to_string(),
            is_admin: false,
            email_verified_at: None,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn store() -> CacheSessionStore {
        CacheSessionStore::new(CacheBackend::new_local(), Duration::from_secs(86_400))
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = store();
        let user = sample_user();
        let client = ClientContext {
            ip: Some("10.0.0.1".to_string()),
            user_agent: Some("test-agent".to_string()),
        };

        let sid = store.create(&user, client).await.unwrap();
        let session = store.get(&sid).await.unwrap().unwrap();
        assert_eq!(session.user_id, user.id);
        assert_eq!(session.email, user.email);
        assert_eq!(session.ip.as_deref(), Some("10.0.0.1"));
    }

    #[tokio::test]
    async fn test_get_absent() {
        let store = store();
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_touch_refreshes_activity() {
        let store = store();
        let user = sample_user();
        let sid = store.create(&user, ClientContext::default()).await.unwrap();

        let before = store.get(&sid).await.unwrap().unwrap().last_activity;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.touch(&sid).await.unwrap());
        let after = store.get(&sid).await.unwrap().unwrap().last_activity;
        assert!(after > before);

        assert!(!store.touch("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_destroy_removes_from_index() {
        let store = store();
        let user = sample_user();
        let sid1 = store.create(&user, ClientContext::default()).await.unwrap();
        let sid2 = store.create(&user, ClientContext::default()).await.unwrap();

        assert!(store.destroy(&sid1).await.unwrap());
        assert!(store.get(&sid1).await.unwrap().is_none());
        assert!(store.get(&sid2).await.unwrap().is_some());

        let ids = store.session_ids(user.id).await;
        assert_eq!(ids, vec![sid2.clone()]);

        // Destroying the last session deletes the index key entirely.
        assert!(store.destroy(&sid2).await.unwrap());
        assert!(
            !store
                .cache
                .exists(&keys::user_sessions_key(user.id))
                .await
        );
    }

    #[tokio::test]
    async fn test_destroy_absent_session() {
        let store = store();
        assert!(!store.destroy("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_destroy_all_for_user() {
        let store = store();
        let user = sample_user();
        let mut sids = Vec::new();
        for _ in 0..3 {
            sids.push(store.create(&user, ClientContext::default()).await.unwrap());
        }

        let destroyed = store.destroy_all_for_user(user.id).await.unwrap();
        assert_eq!(destroyed, 3);
        for sid in sids {
            assert!(store.get(&sid).await.unwrap().is_none());
        }
        assert!(store.session_ids(user.id).await.is_empty());
    }
}

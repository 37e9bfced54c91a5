//! Access/refresh token lifecycle.
//!
//! Issuance is a pure function of user, session, and clock. Revocation is a
//! blacklist entry keyed by the raw token string with a TTL equal to the
//! token's remaining lifetime. Refresh tokens are single-use: rotation
//! blacklists the presented token before a new pair is issued.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;

use crate::error::{AuthError, AuthResult};
use crate::jwt::{JwtService, TokenClaims, TokenClass};
use crate::storage::{TokenBlacklist, UserStore};
use shelfmark_core::User;
use uuid::Uuid;

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Issues, verifies, rotates, and revokes bearer-token pairs.
pub struct TokenLifecycle {
    jwt: JwtService,
    blacklist: Arc<dyn TokenBlacklist>,
    users: Arc<dyn UserStore>,
}

impl TokenLifecycle {
    /// Creates a new lifecycle over the given blacklist and user store.
    #[must_use]
    pub fn new(
        jwt: JwtService,
        blacklist: Arc<dyn TokenBlacklist>,
        users: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            jwt,
            blacklist,
            users,
        }
    }

    /// The user store this lifecycle resolves subjects against.
    #[must_use]
    pub fn user_store(&self) -> &Arc<dyn UserStore> {
        &self.users
    }

    /// Issues a new access/refresh pair bound to a session.
    pub fn issue_pair(&self, user_id: Uuid, session_id: &str) -> AuthResult<TokenPair> {
        Ok(TokenPair {
            access_token: self.jwt.issue(TokenClass::Access, user_id, session_id)?,
            refresh_token: self.jwt.issue(TokenClass::Refresh, user_id, session_id)?,
        })
    }

    /// Verifies an access token: signature, expiry, class, blacklist.
    pub async fn verify_access(&self, token: &str) -> AuthResult<TokenClaims> {
        self.verify(TokenClass::Access, token).await
    }

    /// Verifies a refresh token: signature, expiry, class, blacklist.
    pub async fn verify_refresh(&self, token: &str) -> AuthResult<TokenClaims> {
        self.verify(TokenClass::Refresh, token).await
    }

    async fn verify(&self, class: TokenClass, token: &str) -> AuthResult<TokenClaims> {
        let claims = self.jwt.verify(class, token)?;
        if self.blacklist.is_revoked(token).await? {
            tracing::debug!(jti = %claims.jti, "Token is blacklisted");
            return Err(AuthError::TokenRevoked);
        }
        Ok(claims)
    }

    /// Blacklists a token for the remainder of its natural lifetime.
    ///
    /// The token is decoded without signature verification just to read
    /// `exp`; already-expired or undecodable tokens need no blacklisting
    /// and this becomes a no-op.
    pub async fn blacklist(&self, token: &str) -> AuthResult<()> {
        let Some(expires_at) = JwtService::decode_expiry_unverified(token) else {
            return Ok(());
        };
        let now = OffsetDateTime::now_utc();
        if expires_at <= now {
            return Ok(());
        }
        let remaining = (expires_at - now).unsigned_abs();
        self.blacklist.revoke(token, remaining).await
    }

    /// Rotates a refresh token: verify, resolve the user, blacklist the old
    /// token, issue a fresh pair bound to the same session.
    ///
    /// Returns the new pair and the resolved user.
    pub async fn rotate_refresh(&self, refresh_token: &str) -> AuthResult<(TokenPair, User)> {
        let claims = self.verify_refresh(refresh_token).await?;
        let user_id = claims.user_id()?;
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::invalid_token("Unknown user"))?;

        // Single-use refresh tokens: burn before reissue so a replayed
        // token loses the race even if the response is never delivered.
        self.blacklist(refresh_token).await?;

        let pair = self.issue_pair(user.id, &claims.sid)?;
        tracing::debug!(user_id = %user.id, sid = %claims.sid, "Refresh token rotated");
        Ok((pair, user))
    }

    /// Logout: blacklist the access token and, when presented, the refresh
    /// token. Returns the session id from the access token so the caller
    /// can destroy it.
    pub async fn logout(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> AuthResult<String> {
        let claims = self.verify_access(access_token).await?;
        self.blacklist(access_token).await?;
        if let Some(refresh) = refresh_token {
            self.blacklist(refresh).await?;
        }
        Ok(claims.sid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::TokenBlacklist;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::RwLock;
    use std::time::Duration;

    struct MockBlacklist {
        entries: RwLock<HashMap<String, Duration>>,
    }

    impl MockBlacklist {
        fn new() -> Self {
            Self {
                entries: RwLock::new(HashMap::new()),
            }
        }

        fn ttl_of(&self, token: &str) -> Option<Duration> {
            self.entries.read().unwrap().get(token).copied()
        }
    }

    #[async_trait]
    impl TokenBlacklist for MockBlacklist {
        async fn revoke(&self, token: &str, ttl: Duration) -> AuthResult<()> {
            self.entries
                .write()
                .unwrap()
                .insert(token.to_string(), ttl);
            Ok(())
        }

        async fn is_revoked(&self, token: &str) -> AuthResult<bool> {
            Ok(self.entries.read().unwrap().contains_key(token))
        }
    }

    struct MockUsers {
        users: RwLock<HashMap<Uuid, User>>,
    }

    impl MockUsers {
        fn with_user(user: User) -> Self {
            let mut map = HashMap::new();
            map.insert(user.id, user);
            Self {
                users: RwLock::new(map),
            }
        }

        fn remove(&self, id: Uuid) {
            self.users.write().unwrap().remove(&id);
        }
    }

    #[async_trait]
    impl UserStore for MockUsers {
        async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
            Ok(self.users.read().unwrap().get(&id).cloned())
        }
    }

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

    fn lifecycle(
        user: &User,
    ) -> (TokenLifecycle, Arc<MockBlacklist>, Arc<MockUsers>) {
        let blacklist = Arc::new(MockBlacklist::new());
        let users = Arc::new(MockUsers::with_user(user.clone()));
        let jwt = JwtService::new(
            "access-secret-for-tests",
            "refresh-secret-for-tests",
            Duration::from_secs(900),
            Duration::from_secs(604_800),
        );
        (
            TokenLifecycle::new(jwt, blacklist.clone(), users.clone()),
            blacklist,
            users,
        )
    }

    #[tokio::test]
    async fn test_issue_and_verify_pair() {
        let user = sample_user();
        let (lifecycle, _, _) = lifecycle(&user);

        let pair = lifecycle.issue_pair(user.id, "sess-1").unwrap();
        let access = lifecycle.verify_access(&pair.access_token).await.unwrap();
        let refresh = lifecycle
            .verify_refresh(&pair.refresh_token)
            .await
            .unwrap();
        assert_eq!(access.sub, user.id.to_string());
        assert_eq!(refresh.sid, "sess-1");
    }

    #[tokio::test]
    async fn test_blacklisted_token_rejected() {
        let user = sample_user();
        let (lifecycle, _, _) = lifecycle(&user);

        let pair = lifecycle.issue_pair(user.id, "sess-1").unwrap();
        lifecycle.blacklist(&pair.access_token).await.unwrap();

        let err = lifecycle
            .verify_access(&pair.access_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenRevoked));
    }

    #[tokio::test]
    async fn test_blacklist_ttl_bounded_by_expiry() {
        let user = sample_user();
        let (lifecycle, blacklist, _) = lifecycle(&user);

        let pair = lifecycle.issue_pair(user.id, "sess-1").unwrap();
        lifecycle.blacklist(&pair.access_token).await.unwrap();

        let ttl = blacklist.ttl_of(&pair.access_token).unwrap();
        // Access tokens live 900 s; the entry must not outlive that.
        assert!(ttl <= Duration::from_secs(900));
        assert!(ttl > Duration::from_secs(800));
    }

    #[tokio::test]
    async fn test_blacklist_undecodable_is_noop() {
        let user = sample_user();
        let (lifecycle, blacklist, _) = lifecycle(&user);

        lifecycle.blacklist("garbage").await.unwrap();
        assert!(blacklist.ttl_of("garbage").is_none());
    }

    #[tokio::test]
    async fn test_refresh_rotation_burns_old_token() {
        let user = sample_user();
        let (lifecycle, _, _) = lifecycle(&user);

        let pair1 = lifecycle.issue_pair(user.id, "sess-1").unwrap();
        let (pair2, rotated_user) = lifecycle
            .rotate_refresh(&pair1.refresh_token)
            .await
            .unwrap();
        assert_eq!(rotated_user.id, user.id);

        // The new pair works; replaying the old refresh token fails.
        lifecycle
            .verify_refresh(&pair2.refresh_token)
            .await
            .unwrap();
        let err = lifecycle
            .rotate_refresh(&pair1.refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::TokenRevoked));
    }

    #[tokio::test]
    async fn test_rotation_fails_for_deleted_user() {
        let user = sample_user();
        let (lifecycle, _, users) = lifecycle(&user);

        let pair = lifecycle.issue_pair(user.id, "sess-1").unwrap();
        users.remove(user.id);

        let err = lifecycle
            .rotate_refresh(&pair.refresh_token)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken { .. }));
    }

    #[tokio::test]
    async fn test_logout_blacklists_both_tokens() {
        let user = sample_user();
        let (lifecycle, blacklist, _) = lifecycle(&user);

        let pair = lifecycle.issue_pair(user.id, "sess-1").unwrap();
        let sid = lifecycle
            .logout(&pair.access_token, Some(&pair.refresh_token))
            .await
            .unwrap();
        assert_eq!(sid, "sess-1");
        assert!(blacklist.ttl_of(&pair.access_token).is_some());
        assert!(blacklist.ttl_of(&pair.refresh_token).is_some());
    }
}

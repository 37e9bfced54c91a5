//! Single-use verification and password-reset tokens.
//!
//! Token values carry 256 bits of OS entropy, hex-encoded. At most one live
//! token per kind per user exists: issuing deletes any unused predecessor.
//! Consumption is uniform-rejection — callers learn "valid" or "invalid",
//! never *why* a token was invalid.

use std::sync::Arc;

use rand::RngCore;
use rand::rngs::OsRng;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AuthResult;
use crate::storage::{SweepCounts, VerificationTokenStore};
use shelfmark_core::{TokenKind, User, VerificationToken};

/// Number of random bytes in a token value (256 bits).
const TOKEN_BYTES: usize = 32;

/// Generates a fresh opaque token value.
#[must_use]
pub fn generate_token_value() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Issues and consumes single-use tokens against a backing store.
pub struct VerificationService {
    store: Arc<dyn VerificationTokenStore>,
}

impl VerificationService {
    /// Creates a service over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn VerificationTokenStore>) -> Self {
        Self { store }
    }

    /// Issues a token of the given kind for the user.
    ///
    /// Any unused token of the same kind is deleted first. Expiry follows
    /// the kind: 24 h for email verification, 1 h for password reset.
    pub async fn issue(&self, user_id: Uuid, kind: TokenKind) -> AuthResult<VerificationToken> {
        let replaced = self.store.delete_unused(user_id, kind).await?;
        if replaced > 0 {
            tracing::debug!(user_id = %user_id, kind = %kind, replaced, "Replaced live token");
        }

        let now = OffsetDateTime::now_utc();
        let token = VerificationToken {
            id: Uuid::new_v4(),
            user_id,
            token: generate_token_value(),
            kind,
            expires_at: now + kind.lifetime(),
            used_at: None,
            created_at: now,
        };
        self.store.create(&token).await?;
        Ok(token)
    }

    /// Consumes a token, returning the owning user on success.
    ///
    /// `None` covers every failure mode uniformly (absent, expired, used).
    pub async fn consume(&self, token: &str, kind: TokenKind) -> AuthResult<Option<User>> {
        self.store.consume(token, kind).await
    }

    /// Deletes every token past expiry, returning per-kind counts.
    pub async fn sweep_expired(&self) -> AuthResult<SweepCounts> {
        let counts = self.store.delete_expired().await?;
        if counts.total() > 0 {
            tracing::debug!(
                email_verification = counts.email_verification,
                password_reset = counts.password_reset,
                "Swept expired verification tokens"
            );
        }
        Ok(counts)
    }

    /// Burns every unused token for the user (both kinds).
    pub async fn revoke_all_for_user(&self, user_id: Uuid) -> AuthResult<u64> {
        self.store.burn_all_for_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::RwLock;

    /// In-memory store mirroring the relational semantics.
    struct MockTokenStore {
        tokens: RwLock<HashMap<String, VerificationToken>>,
        users: RwLock<HashMap<Uuid, User>>,
    }

    impl MockTokenStore {
        fn with_user(user: User) -> Self {
            let mut users = HashMap::new();
            users.insert(user.id, user);
            Self {
                tokens: RwLock::new(HashMap::new()),
                users: RwLock::new(users),
            }
        }

        fn live_count(&self, user_id: Uuid, kind: TokenKind) -> usize {
            let now = OffsetDateTime::now_utc();
            self.tokens
                .read()
                .unwrap()
                .values()
                .filter(|t| t.user_id == user_id && t.kind == kind && t.is_valid(now))
                .count()
        }

        fn expire(&self, token: &str) {
            let mut tokens = self.tokens.write().unwrap();
            if let Some(t) = tokens.get_mut(token) {
                t.expires_at = OffsetDateTime::now_utc() - time::Duration::seconds(1);
            }
        }
    }

    #[async_trait]
    impl VerificationTokenStore for MockTokenStore {
        async fn create(&self, token: &VerificationToken) -> AuthResult<()> {
            self.tokens
                .write()
                .unwrap()
                .insert(token.token.clone(), token.clone());
            Ok(())
        }

        async fn delete_unused(&self, user_id: Uuid, kind: TokenKind) -> AuthResult<u64> {
            let mut tokens = self.tokens.write().unwrap();
            let before = tokens.len();
            tokens.retain(|_, t| {
                !(t.user_id == user_id && t.kind == kind && t.used_at.is_none())
            });
            Ok((before - tokens.len()) as u64)
        }

        async fn consume(&self, token: &str, kind: TokenKind) -> AuthResult<Option<User>> {
            let now = OffsetDateTime::now_utc();
            let mut tokens = self.tokens.write().unwrap();
            match tokens.get_mut(token) {
                Some(t) if t.kind == kind && t.is_valid(now) => {
                    t.used_at = Some(now);
                    Ok(self.users.read().unwrap().get(&t.user_id).cloned())
                }
                _ => Ok(None),
            }
        }

        async fn delete_expired(&self) -> AuthResult<SweepCounts> {
            let now = OffsetDateTime::now_utc();
            let mut counts = SweepCounts::default();
            self.tokens.write().unwrap().retain(|_, t| {
                if t.expires_at < now {
                    match t.kind {
                        TokenKind::EmailVerification => counts.email_verification += 1,
                        TokenKind::PasswordReset => counts.password_reset += 1,
                    }
                    false
                } else {
                    true
                }
            });
            Ok(counts)
        }

        async fn burn_all_for_user(&self, user_id: Uuid) -> AuthResult<u64> {
            let now = OffsetDateTime::now_utc();
            let mut burned = 0;
            for t in self.tokens.write().unwrap().values_mut() {
                if t.user_id == user_id && t.used_at.is_none() {
                    t.used_at = Some(now);
                    burned += 1;
                }
            }
            Ok(burned)
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

    #[test]
    fn test_token_value_entropy() {
        let a = generate_token_value();
        let b = generate_token_value();
        assert_eq!(a.len(), TOKEN_BYTES * 2);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_consume_succeeds_exactly_once() {
        let user = sample_user();
        let store = Arc::new(MockTokenStore::with_user(user.clone()));
        let svc = VerificationService::new(store);

        let token = svc
            .issue(user.id, TokenKind::EmailVerification)
            .await
            .unwrap();
        let consumed = svc
            .consume(&token.token, TokenKind::EmailVerification)
            .await
            .unwrap();
        assert_eq!(consumed.unwrap().id, user.id);

        // Second consume with the same string fails.
        let replay = svc
            .consume(&token.token, TokenKind::EmailVerification)
            .await
            .unwrap();
        assert!(replay.is_none());
    }

    #[tokio::test]
    async fn test_kind_mismatch_rejected() {
        let user = sample_user();
        let store = Arc::new(MockTokenStore::with_user(user.clone()));
        let svc = VerificationService::new(store);

        let token = svc.issue(user.id, TokenKind::PasswordReset).await.unwrap();
        let consumed = svc
            .consume(&token.token, TokenKind::EmailVerification)
            .await
            .unwrap();
        assert!(consumed.is_none());
    }

    #[tokio::test]
    async fn test_reissue_invalidates_predecessor() {
        let user = sample_user();
        let store = Arc::new(MockTokenStore::with_user(user.clone()));
        let svc = VerificationService::new(store.clone());

        let first = svc.issue(user.id, TokenKind::PasswordReset).await.unwrap();
        let second = svc.issue(user.id, TokenKind::PasswordReset).await.unwrap();
        assert_eq!(store.live_count(user.id, TokenKind::PasswordReset), 1);

        assert!(
            svc.consume(&first.token, TokenKind::PasswordReset)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            svc.consume(&second.token, TokenKind::PasswordReset)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_expired_token_always_invalid() {
        let user = sample_user();
        let store = Arc::new(MockTokenStore::with_user(user.clone()));
        let svc = VerificationService::new(store.clone());

        let token = svc
            .issue(user.id, TokenKind::EmailVerification)
            .await
            .unwrap();
        store.expire(&token.token);

        let consumed = svc
            .consume(&token.token, TokenKind::EmailVerification)
            .await
            .unwrap();
        assert!(consumed.is_none());
    }

    #[tokio::test]
    async fn test_sweep_counts_per_kind() {
        let user = sample_user();
        let store = Arc::new(MockTokenStore::with_user(user.clone()));
        let svc = VerificationService::new(store.clone());

        let v = svc
            .issue(user.id, TokenKind::EmailVerification)
            .await
            .unwrap();
        let r = svc.issue(user.id, TokenKind::PasswordReset).await.unwrap();
        store.expire(&v.token);
        store.expire(&r.token);

        let counts = svc.sweep_expired().await.unwrap();
        assert_eq!(counts.email_verification, 1);
        assert_eq!(counts.password_reset, 1);
        assert_eq!(counts.total(), 2);
    }

    #[tokio::test]
    async fn test_revoke_all_burns_unused() {
        let user = sample_user();
        let store = Arc::new(MockTokenStore::with_user(user.clone()));
        let svc = VerificationService::new(store);

        let token = svc.issue(user.id, TokenKind::PasswordReset).await.unwrap();
        let burned = svc.revoke_all_for_user(user.id).await.unwrap();
        assert_eq!(burned, 1);

        assert!(
            svc.consume(&token.token, TokenKind::PasswordReset)
                .await
                .unwrap()
                .is_none()
        );
    }
}

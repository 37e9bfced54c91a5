//! Token blacklist trait.
//!
//! Stateless JWTs are "revoked" by recording the raw token string until its
//! natural expiry. Entries never outlive the token they revoke, which
//! bounds blacklist growth without a sweep.

use std::time::Duration;

use async_trait::async_trait;

use crate::AuthResult;

/// Storage trait for revoked bearer tokens.
#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// Records the raw token string for `ttl` (its remaining lifetime).
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke(&self, token: &str, ttl: Duration) -> AuthResult<()>;

    /// Checks whether the exact token string has been revoked.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn is_revoked(&self, token: &str) -> AuthResult<bool>;
}

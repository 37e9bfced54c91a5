//! Verification token storage trait.
//!
//! Single-use tokens (email verification, password reset) are relationally
//! persisted. Consumption must be atomic: two concurrent attempts on the
//! same token string result in exactly one success, enforced by the backing
//! store's conditional update on `used_at IS NULL`.

use async_trait::async_trait;
use uuid::Uuid;

use crate::AuthResult;
use shelfmark_core::{TokenKind, User, VerificationToken};

/// Per-kind counts returned by the expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepCounts {
    pub email_verification: u64,
    pub password_reset: u64,
}

impl SweepCounts {
    /// Total rows deleted across both kinds.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.email_verification + self.password_reset
    }
}

/// Storage trait for single-use verification tokens.
#[async_trait]
pub trait VerificationTokenStore: Send + Sync {
    /// Persists a freshly issued token.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be stored (duplicate value,
    /// storage unavailable).
    async fn create(&self, token: &VerificationToken) -> AuthResult<()>;

    /// Deletes any unused tokens of the given kind for the user.
    ///
    /// Called before issuing a replacement so at most one live token per
    /// kind per user exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete_unused(&self, user_id: Uuid, kind: TokenKind) -> AuthResult<u64>;

    /// Atomically consumes a token, returning the owning user.
    ///
    /// Marks `used_at` iff the token matches the string and kind, is
    /// unused, and has not expired. Returns `None` for every failure mode
    /// (absent, expired, already used) — callers must not distinguish them.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn consume(&self, token: &str, kind: TokenKind) -> AuthResult<Option<User>>;

    /// Deletes all tokens past expiry, used or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete_expired(&self) -> AuthResult<SweepCounts>;

    /// Marks all of a user's unused tokens as used without deleting rows.
    ///
    /// Used when the user's credentials change. Returns the number of
    /// tokens burned.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn burn_all_for_user(&self, user_id: Uuid) -> AuthResult<u64>;
}

//! Arc-owning storage adapters for use with the auth layer.
//!
//! These adapters wrap the lifetime-based storage types and own an
//! `Arc<PgPool>`, allowing them to be used as `Arc<dyn Trait>` in the token
//! lifecycle and middleware.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use shelfmark_auth::storage::{
    SweepCounts, UserStore as UserStoreTrait,
    VerificationTokenStore as VerificationTokenStoreTrait,
};
use shelfmark_auth::{AuthError, AuthResult};
use shelfmark_core::{TokenKind, User, VerificationToken};

use crate::user::UserStorage;
use crate::verification_token::VerificationTokenStorage;
use crate::{PgPool, StorageError};

fn into_auth_error(err: StorageError) -> AuthError {
    AuthError::storage(err.to_string())
}

// =============================================================================
// Arc-Owning User Store
// =============================================================================

/// Arc-owning PostgreSQL user store adapter.
#[derive(Clone)]
pub struct PgUserStore {
    pool: Arc<PgPool>,
}

impl PgUserStore {
    /// Create a new Arc-owning user store.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStoreTrait for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
        let storage = UserStorage::new(&self.pool);
        storage.find_by_id(id).await.map_err(into_auth_error)
    }
}

// =============================================================================
// Arc-Owning Verification Token Store
// =============================================================================

/// Arc-owning PostgreSQL verification token store adapter.
#[derive(Clone)]
pub struct PgVerificationTokenStore {
    pool: Arc<PgPool>,
}

impl PgVerificationTokenStore {
    /// Create a new Arc-owning token store.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VerificationTokenStoreTrait for PgVerificationTokenStore {
    async fn create(&self, token: &VerificationToken) -> AuthResult<()> {
        let storage = VerificationTokenStorage::new(&self.pool);
        storage
            .create(token)
            .await
            .map(|_| ())
            .map_err(into_auth_error)
    }

    async fn delete_unused(&self, user_id: Uuid, kind: TokenKind) -> AuthResult<u64> {
        let storage = VerificationTokenStorage::new(&self.pool);
        storage
            .delete_unused(user_id, kind)
            .await
            .map_err(into_auth_error)
    }

    async fn consume(&self, token: &str, kind: TokenKind) -> AuthResult<Option<User>> {
        let storage = VerificationTokenStorage::new(&self.pool);
        storage.consume(token, kind).await.map_err(into_auth_error)
    }

    async fn delete_expired(&self) -> AuthResult<SweepCounts> {
        let storage = VerificationTokenStorage::new(&self.pool);
        storage.delete_expired().await.map_err(into_auth_error)
    }

    async fn burn_all_for_user(&self, user_id: Uuid) -> AuthResult<u64> {
        let storage = VerificationTokenStorage::new(&self.pool);
        storage
            .burn_all_for_user(user_id)
            .await
            .map_err(into_auth_error)
    }
}

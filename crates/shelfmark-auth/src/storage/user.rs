//! User lookup trait.
//!
//! The auth layer only ever needs to resolve a token subject back to a live
//! account; the full user CRUD surface lives on the storage backend itself.

use async_trait::async_trait;
use uuid::Uuid;

use crate::AuthResult;
use shelfmark_core::User;

/// Resolves user ids for token verification and refresh rotation.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Finds a user by id.
    ///
    /// Returns `None` when the account does not exist (e.g. deleted after
    /// the token was issued).
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>>;
}

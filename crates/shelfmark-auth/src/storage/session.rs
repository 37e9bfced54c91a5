//! Session storage trait and session data types.
//!
//! Sessions are cache-resident with a fixed TTL; an expired session is
//! indistinguishable from an absent one. A secondary per-user index lets
//! credential changes revoke every session at once.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use shelfmark_core::User;

/// Request-level client metadata captured at login.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

/// A logged-in session with a denormalized user snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    /// Opaque unique session id.
    pub id: String,
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    pub is_admin: bool,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity: OffsetDateTime,
}

/// Storage trait for logged-in sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates a session for the user, returning its opaque id.
    ///
    /// The id is appended to the user's session list; both entries carry
    /// the full session TTL.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn create(&self, user: &User, client: ClientContext) -> AuthResult<String>;

    /// Looks up a session. Expired sessions read as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn get(&self, session_id: &str) -> AuthResult<Option<SessionData>>;

    /// Refreshes `last_activity` and re-applies the full TTL.
    ///
    /// Returns `false` when the session is absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn touch(&self, session_id: &str) -> AuthResult<bool>;

    /// Destroys a session and removes it from the owner's session list.
    ///
    /// The list key itself is deleted when it becomes empty. Returns
    /// `false` when the session was already absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn destroy(&self, session_id: &str) -> AuthResult<bool>;

    /// Destroys every session in the user's list, then the list itself.
    ///
    /// Returns the number of sessions destroyed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn destroy_all_for_user(&self, user_id: Uuid) -> AuthResult<u64>;
}

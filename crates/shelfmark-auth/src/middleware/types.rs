//! Authenticated request context.

use uuid::Uuid;

use crate::jwt::TokenClaims;
use shelfmark_core::User;

/// The resolved user attached to an authenticated request, together with
/// the claims of the access token that authenticated it.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub claims: TokenClaims,
}

impl CurrentUser {
    /// The authenticated user's id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.user.id
    }

    /// Whether the user carries the admin flag.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.is_admin
    }

    /// The session id the access token was issued under.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.claims.sid
    }
}

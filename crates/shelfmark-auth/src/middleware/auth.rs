//! Bearer token authentication extractors.
//!
//! Axum extractors validating `Authorization: Bearer <token>` headers and
//! attaching the resolved user to the request.
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, routing::get};
//! use shelfmark_auth::middleware::{AuthState, BearerAuth};
//!
//! async fn protected_handler(BearerAuth(current): BearerAuth) -> String {
//!     format!("Hello, {}!", current.user.name)
//! }
//!
//! let app = Router::new()
//!     .route("/protected", get(protected_handler))
//!     .with_state(auth_state);
//! ```

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::AuthError;
use crate::storage::SessionStore;
use crate::tokens::TokenLifecycle;

use super::types::CurrentUser;

// =============================================================================
// Auth State
// =============================================================================

/// State required for bearer token authentication.
///
/// Include this in your application state and make it available to the
/// extractors via `FromRef`.
#[derive(Clone)]
pub struct AuthState {
    /// Token lifecycle for validation and the user store behind it.
    pub lifecycle: Arc<TokenLifecycle>,

    /// Session store; authenticated requests refresh their session TTL.
    pub sessions: Arc<dyn SessionStore>,
}

impl AuthState {
    /// Creates a new auth state.
    #[must_use]
    pub fn new(lifecycle: Arc<TokenLifecycle>, sessions: Arc<dyn SessionStore>) -> Self {
        Self {
            lifecycle,
            sessions,
        }
    }
}

// =============================================================================
// Bearer Auth Extractor
// =============================================================================

/// Extractor that validates a Bearer token and resolves the user.
///
/// Rejects with 401 when the header is missing or malformed, the token is
/// invalid, expired, or blacklisted, or the referenced user no longer
/// exists. On success the owning session's TTL is refreshed best-effort.
pub struct BearerAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for BearerAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = AuthState::from_ref(state);
        let token = extract_bearer_token(parts)?;

        let claims = auth_state.lifecycle.verify_access(token).await?;
        let user_id = claims.user_id()?;

        let user = auth_state
            .lifecycle
            .user_store()
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| {
                tracing::debug!(user_id = %user_id, "Token subject no longer exists");
                AuthError::invalid_token("Unknown user")
            })?;

        // Keep the session alive while the account is active. Failure here
        // must not reject an otherwise valid request.
        if let Err(e) = auth_state.sessions.touch(&claims.sid).await {
            tracing::warn!(sid = %claims.sid, error = %e, "Session touch failed");
        }

        tracing::debug!(user_id = %user.id, jti = %claims.jti, "Token validated");
        Ok(BearerAuth(CurrentUser { user, claims }))
    }
}

// =============================================================================
// Optional Bearer Auth Extractor
// =============================================================================

/// Extractor that optionally validates a Bearer token.
///
/// Unlike [`BearerAuth`], any failure (missing header, bad token, unknown
/// user) silently resolves to `None` instead of rejecting.
pub struct OptionalBearerAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalBearerAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match BearerAuth::from_request_parts(parts, state).await {
            Ok(BearerAuth(current)) => Ok(OptionalBearerAuth(Some(current))),
            Err(e) => {
                tracing::debug!(error = %e, "Optional auth not applied");
                Ok(OptionalBearerAuth(None))
            }
        }
    }
}

// =============================================================================
// Admin Auth Extractor
// =============================================================================

/// Extractor requiring an authenticated user with the admin flag.
///
/// Authentication failures reject with 401, a missing admin flag with 403.
pub struct AdminAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for AdminAuth
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let BearerAuth(current) = BearerAuth::from_request_parts(parts, state).await?;
        if !current.is_admin() {
            tracing::debug!(user_id = %current.id(), "Admin access denied");
            return Err(AuthError::forbidden("Admin access required"));
        }
        Ok(AdminAuth(current))
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Pulls the bearer token out of the Authorization header.
fn extract_bearer_token(parts: &Parts) -> Result<&str, AuthError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AuthError::unauthorized("Missing Authorization header"))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::unauthorized("Malformed Authorization header"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_auth(value: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/books");
        if let Some(v) = value {
            builder = builder.header(AUTHORIZATION, v);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn test_extract_bearer_token() {
        let parts = parts_with_auth(Some("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&parts).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_missing_header_rejected() {
        let parts = parts_with_auth(None);
        let err = extract_bearer_token(&parts).unwrap_err();
        assert!(matches!(err, AuthError::Unauthorized { .. }));
    }

    #[test]
    fn test_malformed_header_rejected() {
        for value in ["Basic dXNlcjpwYXNz", "Bearer", "Bearer   "] {
            let parts = parts_with_auth(Some(value));
            assert!(extract_bearer_token(&parts).is_err(), "accepted {value:?}");
        }
    }
}

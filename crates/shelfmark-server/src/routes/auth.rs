//! Authentication endpoints.
//!
//! Credential failures are uniform: login never distinguishes an unknown
//! email from a wrong password, and token consumption never reports *why* a
//! token was rejected.

use std::net::SocketAddr;
use std::sync::OnceLock;

use axum::Json;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use shelfmark_auth::TokenPair;
use shelfmark_auth::password;
use shelfmark_auth::storage::ClientContext;
use shelfmark_core::{ApiError, PublicUser, TokenKind, User};

use crate::error::{AppError, AppResult};
use crate::mail::templates;
use crate::middleware::client_ip;
use crate::state::AppState;

use super::MessageResponse;

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Serialize)]
pub struct AuthResponse {
    pub user: PublicUser,
    pub tokens: TokenPair,
}

#[derive(Serialize)]
pub struct TokensResponse {
    pub tokens: TokenPair,
}

#[derive(Serialize)]
pub struct UserResponse {
    pub user: PublicUser,
}

// =============================================================================
// Handlers
// =============================================================================

/// `POST /auth/register`
pub async fn register(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    validate_registration(&req)?;

    let password_hash = password::hash_password(&req.password).map_err(AppError::from)?;
    let now = OffsetDateTime::now_utc();
    let user = User {
        id: Uuid::new_v4(),
        name: req.name.trim().to_string(),
        email: req.email.trim().to_string(),
        password_hash,
        is_admin: false,
        email_verified_at: None,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    };
    let user = state.storage.users().create(&user).await?;

    let tokens = open_session(&state, &user, &headers, addr).await?;

    let token = state
        .verification
        .issue(user.id, TokenKind::EmailVerification)
        .await?;
    let (subject, body) = templates::verification_email(
        &state.config.mail.frontend_base_url,
        &user.name,
        &token.token,
    );
    if let Err(e) = state.mailer.send(&user.email, &subject, &body).await {
        tracing::warn!(user_id = %user.id, error = %e, "Verification email failed");
    }

    tracing::info!(user_id = %user.id, "User registered");
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user: user.to_public(),
            tokens,
        }),
    ))
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let user = state.storage.users().find_by_email(&req.email).await?;
    let Some(mut user) = user else {
        return Err(invalid_credentials());
    };
    if !password::verify_password(&req.password, &user.password_hash).map_err(AppError::from)? {
        return Err(invalid_credentials());
    }

    let now = OffsetDateTime::now_utc();
    if let Err(e) = state.storage.users().update_last_login(user.id).await {
        tracing::warn!(user_id = %user.id, error = %e, "Last-login update failed");
    } else {
        user.last_login_at = Some(now);
    }

    let tokens = open_session(&state, &user, &headers, addr).await?;

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(AuthResponse {
        user: user.to_public(),
        tokens,
    }))
}

/// `POST /auth/refresh`
///
/// Refresh tokens are single-use: the presented token is blacklisted before
/// the fresh pair is returned, so a replay fails.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<Json<TokensResponse>> {
    let (tokens, user) = state
        .auth
        .lifecycle
        .rotate_refresh(&req.refresh_token)
        .await?;
    tracing::debug!(user_id = %user.id, "Token pair refreshed");
    Ok(Json(TokensResponse { tokens }))
}

/// `POST /auth/logout`
///
/// Blacklists the access token and, when presented, the refresh token, and
/// destroys the session they were issued under.
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<LogoutRequest>>,
) -> AppResult<Json<MessageResponse>> {
    let access_token = headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::authentication("Missing Authorization header"))
        .map_err(AppError::from)?;
    let refresh_token = body.and_then(|Json(b)| b.refresh_token);

    let session_id = state
        .auth
        .lifecycle
        .logout(access_token, refresh_token.as_deref())
        .await?;
    if let Err(e) = state.sessions.destroy(&session_id).await {
        tracing::warn!(sid = %session_id, error = %e, "Session destroy failed");
    }

    Ok(Json(MessageResponse {
        message: "Logged out",
    }))
}

/// `POST /auth/forgot-password`
///
/// Responds 200 whether or not the account exists.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(req): Json<ForgotPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    match state.storage.users().find_by_email(&req.email).await {
        Ok(Some(user)) => match state.verification.issue(user.id, TokenKind::PasswordReset).await {
            Ok(token) => {
                let (subject, body) = templates::password_reset_email(
                    &state.config.mail.frontend_base_url,
                    &user.name,
                    &token.token,
                );
                if let Err(e) = state.mailer.send(&user.email, &subject, &body).await {
                    tracing::warn!(user_id = %user.id, error = %e, "Reset email failed");
                }
            }
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Reset token issuance failed");
            }
        },
        Ok(None) => {
            tracing::debug!("Password reset requested for unknown email");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Password reset lookup failed");
        }
    }

    Ok(Json(MessageResponse {
        message: "If the email is registered, a reset link has been sent",
    }))
}

/// `POST /auth/reset-password`
///
/// A successful reset burns every outstanding verification token and
/// destroys every session for the user.
pub async fn reset_password(
    State(state): State<AppState>,
    Json(req): Json<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    if let Err(message) = password::validate_strength(&req.password) {
        return Err(AppError(ApiError::validation_with_details(
            "Invalid password",
            serde_json::json!({ "password": message }),
        )));
    }

    let user = state
        .verification
        .consume(&req.token, TokenKind::PasswordReset)
        .await?
        .ok_or_else(invalid_token)?;

    let password_hash = password::hash_password(&req.password).map_err(AppError::from)?;
    state
        .storage
        .users()
        .update_password(user.id, &password_hash)
        .await?;

    if let Err(e) = state.verification.revoke_all_for_user(user.id).await {
        tracing::warn!(user_id = %user.id, error = %e, "Token revocation failed");
    }
    if let Err(e) = state.sessions.destroy_all_for_user(user.id).await {
        tracing::warn!(user_id = %user.id, error = %e, "Session revocation failed");
    }
    state.users.invalidate(user.id).await;

    tracing::info!(user_id = %user.id, "Password reset");
    Ok(Json(MessageResponse {
        message: "Password has been reset",
    }))
}

/// `POST /auth/verify-email`
pub async fn verify_email(
    State(state): State<AppState>,
    Json(req): Json<VerifyEmailRequest>,
) -> AppResult<Json<UserResponse>> {
    let user = state
        .verification
        .consume(&req.token, TokenKind::EmailVerification)
        .await?
        .ok_or_else(invalid_token)?;

    let updated = state.storage.users().mark_email_verified(user.id).await?;
    state.users.invalidate(user.id).await;

    let (subject, body) =
        templates::welcome_email(&state.config.mail.frontend_base_url, &updated.name);
    if let Err(e) = state.mailer.send(&updated.email, &subject, &body).await {
        tracing::warn!(user_id = %updated.id, error = %e, "Welcome email failed");
    }

    tracing::info!(user_id = %updated.id, "Email verified");
    Ok(Json(UserResponse {
        user: updated.to_public(),
    }))
}

// =============================================================================
// Helpers
// =============================================================================

/// Creates a session for the user and issues the token pair bound to it.
async fn open_session(
    state: &AppState,
    user: &User,
    headers: &HeaderMap,
    addr: SocketAddr,
) -> Result<TokenPair, AppError> {
    let client = ClientContext {
        ip: Some(client_ip(headers, addr)),
        user_agent: headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };
    let session_id = state.sessions.create(user, client).await?;
    let tokens = state.auth.lifecycle.issue_pair(user.id, &session_id)?;
    Ok(tokens)
}

/// Uniform credential failure: unknown email and wrong password read the
/// same.
fn invalid_credentials() -> AppError {
    AppError(ApiError::authentication("Invalid email or password"))
}

/// Uniform token failure: absent, expired, and used tokens read the same.
fn invalid_token() -> AppError {
    AppError(ApiError::validation("Invalid or expired token"))
}

fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid")
    })
}

fn validate_registration(req: &RegisterRequest) -> Result<(), AppError> {
    let mut details = serde_json::Map::new();
    if req.name.trim().is_empty() {
        details.insert("name".into(), "name must not be empty".into());
    }
    if !email_regex().is_match(req.email.trim()) {
        details.insert("email".into(), "email address is invalid".into());
    }
    if let Err(message) = password::validate_strength(&req.password) {
        details.insert("password".into(), message.into());
    }
    if details.is_empty() {
        Ok(())
    } else {
        Err(AppError(ApiError::validation_with_details(
            "Invalid registration fields",
            serde_json::Value::Object(details),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_regex() {
        assert!(email_regex().is_match("a@x.com"));
        assert!(email_regex().is_match("first.last@sub.example.org"));
        assert!(!email_regex().is_match("missing-at.example.com"));
        assert!(!email_regex().is_match("two@@x.com"));
        assert!(!email_regex().is_match("spaces in@x.com"));
    }

    #[test]
    fn test_registration_validation_collects_all_fields() {
        let req = RegisterRequest {
            name: " ".to_string(),
            email: "nope".to_string(),
            password: "short".to_string(),
        };
        let err = validate_registration(&req).unwrap_err();
        let body = err.0.to_body();
        let details = body.details.unwrap();
        assert!(details.get("name").is_some());
        assert!(details.get("email").is_some());
        assert!(details.get("password").is_some());
    }

    #[test]
    fn test_registration_validation_accepts_valid() {
        let req = RegisterRequest {
            name: "A".to_string(),
            email: "a@x.com".to_string(),
            password: "Aa123456".to_string(),
        };
        assert!(validate_registration(&req).is_ok());
    }

    #[test]
    fn test_uniform_failure_messages() {
        // The two oracle-resistant messages never vary by cause.
        assert_eq!(
            invalid_credentials().0.to_body().message,
            "Invalid email or password"
        );
        assert_eq!(
            invalid_token().0.to_body().message,
            "Invalid or expired token"
        );
        assert_eq!(invalid_token().0.status_code(), 400);
    }
}

//! Domain model: users, books, and verification tokens.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Lowest accepted book rating (inclusive).
pub const RATING_MIN: f32 = 1.0;
/// Highest accepted book rating (inclusive).
pub const RATING_MAX: f32 = 5.0;

// =============================================================================
// User
// =============================================================================

/// A registered account.
///
/// `email_verified_at` is `None` until the first successful email
/// verification; it is set exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Unique, compared case-insensitively.
    pub email: String,
    /// Argon2 hash, never serialized to API responses.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_admin: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub email_verified_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Whether the account has completed email verification.
    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.email_verified_at.is_some()
    }

    /// Public projection without the credential hash.
    #[must_use]
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            is_admin: self.is_admin,
            email_verified_at: self.email_verified_at,
            last_login_at: self.last_login_at,
            created_at: self.created_at,
        }
    }
}

/// The user shape returned by the API: everything except credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub email_verified_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_login_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

// =============================================================================
// Book
// =============================================================================

/// A catalog entry owned by the user who created it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub description: String,
    /// Public path of the stored thumbnail, if any.
    pub thumbnail: Option<String>,
    /// Bounded to `[RATING_MIN, RATING_MAX]` when present.
    pub rating: Option<f32>,
    pub created_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Book {
    /// Whether `user_id` (with the given admin flag) may mutate this book.
    #[must_use]
    pub fn can_be_modified_by(&self, user_id: Uuid, is_admin: bool) -> bool {
        is_admin || self.created_by == user_id
    }
}

/// Validates a rating against the accepted bounds.
///
/// Returns the offending message on failure so callers can attach it to a
/// field-level validation error.
pub fn validate_rating(rating: f32) -> Result<(), String> {
    if !rating.is_finite() || rating < RATING_MIN || rating > RATING_MAX {
        return Err(format!(
            "rating must be between {RATING_MIN} and {RATING_MAX}"
        ));
    }
    Ok(())
}

// =============================================================================
// Verification tokens
// =============================================================================

/// The two single-use token kinds handled by the token store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    EmailVerification,
    PasswordReset,
}

impl TokenKind {
    /// Database tag for this kind.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmailVerification => "email_verification",
            Self::PasswordReset => "password_reset",
        }
    }

    /// Parses the database tag.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "email_verification" => Some(Self::EmailVerification),
            "password_reset" => Some(Self::PasswordReset),
            _ => None,
        }
    }

    /// Token lifetime: 24 h for verification, 1 h for password reset.
    #[must_use]
    pub fn lifetime(&self) -> time::Duration {
        match self {
            Self::EmailVerification => time::Duration::hours(24),
            Self::PasswordReset => time::Duration::hours(1),
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted single-use token (email verification or password reset).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationToken {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Opaque random value, unique across all tokens.
    pub token: String,
    pub kind: TokenKind,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub used_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl VerificationToken {
    /// A token is valid iff it is unused and not yet expired.
    #[must_use]
    pub fn is_valid(&self, now: OffsetDateTime) -> bool {
        self.used_at.is_none() && now < self.expires_at
    }
}

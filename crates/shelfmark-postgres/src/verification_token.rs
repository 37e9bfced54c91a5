//! Verification token storage.
//!
//! Consumption is a single conditional UPDATE: the `used_at IS NULL AND
//! expires_at > NOW()` predicate and the `used_at` write happen in one
//! statement, so two concurrent consumers of the same token resolve to
//! exactly one winner.

use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{PgPool, StorageError, StorageResult};
use shelfmark_core::{TokenKind, User, VerificationToken};

// =============================================================================
// Types
// =============================================================================

type TokenTuple = (
    Uuid,
    Uuid,
    String,
    String,
    OffsetDateTime,
    Option<OffsetDateTime>,
    OffsetDateTime,
);

const TOKEN_COLUMNS: &str = "id, user_id, token, kind, expires_at, used_at, created_at";

fn token_from_tuple(row: TokenTuple) -> StorageResult<VerificationToken> {
    let kind = TokenKind::parse(&row.3)
        .ok_or_else(|| StorageError::invalid_data(format!("Unknown token kind '{}'", row.3)))?;
    Ok(VerificationToken {
        id: row.0,
        user_id: row.1,
        token: row.2,
        kind,
        expires_at: row.4,
        used_at: row.5,
        created_at: row.6,
    })
}

type UserTuple = (
    Uuid,
    String,
    String,
    String,
    bool,
    Option<OffsetDateTime>,
    Option<OffsetDateTime>,
    OffsetDateTime,
    OffsetDateTime,
);

fn user_from_tuple(row: UserTuple) -> User {
    User {
        id: row.0,
        name: row.1,
        email: row.2,
        password_hash: row.3,
        is_admin: row.4,
        email_verified_at: row.5,
        last_login_at: row.6,
        created_at: row.7,
        updated_at: row.8,
    }
}

// =============================================================================
// Verification Token Storage
// =============================================================================

/// Verification token storage operations.
pub struct VerificationTokenStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> VerificationTokenStorage<'a> {
    /// Create a new token storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Persist a freshly issued token.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when the token value collides, or an error if the
    /// insert fails.
    pub async fn create(&self, token: &VerificationToken) -> StorageResult<VerificationToken> {
        let row: TokenTuple = query_as(&format!(
            r#"
            INSERT INTO verification_tokens (id, user_id, token, kind,
                                             expires_at, used_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {TOKEN_COLUMNS}
            "#
        ))
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token)
        .bind(token.kind.as_str())
        .bind(token.expires_at)
        .bind(token.used_at)
        .bind(token.created_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx_core::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StorageError::conflict("Token value already exists");
            }
            StorageError::from(e)
        })?;

        token_from_tuple(row)
    }

    /// Delete any unused tokens of the given kind for the user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete_unused(&self, user_id: Uuid, kind: TokenKind) -> StorageResult<u64> {
        let result = query(
            r#"
            DELETE FROM verification_tokens
            WHERE user_id = $1
              AND kind = $2
              AND used_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(kind.as_str())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Atomically consume a token and return the owning user.
    ///
    /// Returns `None` uniformly for absent, expired, and already-used
    /// tokens, and for the edge where the owning account vanished between
    /// issuance and consumption.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn consume(&self, token: &str, kind: TokenKind) -> StorageResult<Option<User>> {
        let row: Option<UserTuple> = query_as(
            r#"
            WITH consumed AS (
                UPDATE verification_tokens
                SET used_at = NOW()
                WHERE token = $1
                  AND kind = $2
                  AND used_at IS NULL
                  AND expires_at > NOW()
                RETURNING user_id
            )
            SELECT u.id, u.name, u.email, u.password_hash, u.is_admin,
                   u.email_verified_at, u.last_login_at, u.created_at, u.updated_at
            FROM users u
            JOIN consumed c ON u.id = c.user_id
            "#,
        )
        .bind(token)
        .bind(kind.as_str())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(user_from_tuple))
    }

    /// Delete all tokens past expiry, used or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete_expired(
        &self,
    ) -> StorageResult<shelfmark_auth::storage::SweepCounts> {
        let kinds: Vec<(String,)> = query_as(
            r#"
            DELETE FROM verification_tokens
            WHERE expires_at < NOW()
            RETURNING kind
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        let mut counts = shelfmark_auth::storage::SweepCounts::default();
        for (kind,) in kinds {
            match TokenKind::parse(&kind) {
                Some(TokenKind::EmailVerification) => counts.email_verification += 1,
                Some(TokenKind::PasswordReset) => counts.password_reset += 1,
                None => {}
            }
        }
        Ok(counts)
    }

    /// Mark all of a user's unused tokens as used without deleting rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the database update fails.
    pub async fn burn_all_for_user(&self, user_id: Uuid) -> StorageResult<u64> {
        let result = query(
            r#"
            UPDATE verification_tokens
            SET used_at = NOW()
            WHERE user_id = $1
              AND used_at IS NULL
            "#,
        )
        .bind(user_id)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Find a token by its value, regardless of state. Used by tests and
    /// admin diagnostics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_value(&self, token: &str) -> StorageResult<Option<VerificationToken>> {
        let row: Option<TokenTuple> = query_as(&format!(
            r#"
            SELECT {TOKEN_COLUMNS}
            FROM verification_tokens
            WHERE token = $1
            "#
        ))
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        row.map(token_from_tuple).transpose()
    }
}

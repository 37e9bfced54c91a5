//! User storage.
//!
//! Email uniqueness is case-insensitive, enforced by the
//! `users_email_lower_idx` index; lookups lowercase the needle while the
//! stored value keeps its registered casing.

use serde::{Deserialize, Serialize};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{PgPool, StorageError, StorageResult};
use shelfmark_core::User;

// =============================================================================
// Types
// =============================================================================

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

const USER_COLUMNS: &str =
    "id, name, email, password_hash, is_admin, email_verified_at, last_login_at, created_at, updated_at";

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

/// Aggregate counters for the admin stats endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total: i64,
    pub verified: i64,
    pub admins: i64,
    pub registered_last_30_days: i64,
}

// =============================================================================
// User Storage
// =============================================================================

/// User storage operations.
pub struct UserStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> UserStorage<'a> {
    /// Create a new user storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when the email is already registered, or an error
    /// if the insert fails.
    pub async fn create(&self, user: &User) -> StorageResult<User> {
        let row: UserTuple = query_as(&format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, is_admin,
                               email_verified_at, last_login_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(user.email_verified_at)
        .bind(user.last_login_at)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            if let sqlx_core::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StorageError::conflict("Email is already registered");
            }
            StorageError::from(e)
        })?;

        Ok(user_from_tuple(row))
    }

    /// Find a user by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<User>> {
        let row: Option<UserTuple> = query_as(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(user_from_tuple))
    }

    /// Find a user by email, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_email(&self, email: &str) -> StorageResult<Option<User>> {
        let row: Option<UserTuple> = query_as(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE LOWER(email) = LOWER($1)
            "#
        ))
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(user_from_tuple))
    }

    /// Replace the password hash.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the user does not exist.
    pub async fn update_password(&self, id: Uuid, password_hash: &str) -> StorageResult<()> {
        let result = query(
            r#"
            UPDATE users
            SET password_hash = $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(format!("User {id}")));
        }
        Ok(())
    }

    /// Set the email-verified timestamp.
    ///
    /// The timestamp is written at most once: a user verified earlier keeps
    /// the original stamp.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the user does not exist.
    pub async fn mark_email_verified(&self, id: Uuid) -> StorageResult<User> {
        let row: Option<UserTuple> = query_as(&format!(
            r#"
            UPDATE users
            SET email_verified_at = COALESCE(email_verified_at, NOW()),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(user_from_tuple)
            .ok_or_else(|| StorageError::not_found(format!("User {id}")))
    }

    /// Update last login timestamp.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the user does not exist.
    pub async fn update_last_login(&self, id: Uuid) -> StorageResult<()> {
        let result = query(
            r#"
            UPDATE users
            SET last_login_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(format!("User {id}")));
        }
        Ok(())
    }

    /// Set or clear the admin flag.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the user does not exist.
    pub async fn set_admin(&self, id: Uuid, is_admin: bool) -> StorageResult<User> {
        let row: Option<UserTuple> = query_as(&format!(
            r#"
            UPDATE users
            SET is_admin = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(is_admin)
        .fetch_optional(self.pool)
        .await?;

        row.map(user_from_tuple)
            .ok_or_else(|| StorageError::not_found(format!("User {id}")))
    }

    /// Delete a user. Owned books and tokens go with it (FK cascade).
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the user does not exist.
    pub async fn delete(&self, id: Uuid) -> StorageResult<()> {
        let result = query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(format!("User {id}")));
        }
        Ok(())
    }

    /// List users, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self, limit: i64, offset: i64) -> StorageResult<Vec<User>> {
        let rows: Vec<UserTuple> = query_as(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(user_from_tuple).collect())
    }

    /// Count all users.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count(&self) -> StorageResult<i64> {
        let count: i64 = query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Aggregate counters for the admin stats endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn stats(&self) -> StorageResult<UserStats> {
        let row: (i64, i64, i64, i64) = query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(email_verified_at),
                   COUNT(*) FILTER (WHERE is_admin),
                   COUNT(*) FILTER (WHERE created_at > NOW() - INTERVAL '30 days')
            FROM users
            "#,
        )
        .fetch_one(self.pool)
        .await?;

        Ok(UserStats {
            total: row.0,
            verified: row.1,
            admins: row.2,
            registered_last_30_days: row.3,
        })
    }
}

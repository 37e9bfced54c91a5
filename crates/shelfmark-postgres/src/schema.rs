//! Schema bootstrap.
//!
//! The schema is fixed, so the tables are created directly at startup
//! rather than through a migration chain. Every statement is idempotent.

use sqlx_core::query::query;

use crate::{PgPool, StorageResult};

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        is_admin BOOLEAN NOT NULL DEFAULT FALSE,
        email_verified_at TIMESTAMPTZ,
        last_login_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    // Email uniqueness is case-insensitive.
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS users_email_lower_idx
        ON users (LOWER(email))
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS books (
        id UUID PRIMARY KEY,
        title TEXT NOT NULL,
        author TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        thumbnail TEXT,
        rating REAL CHECK (rating >= 1.0 AND rating <= 5.0),
        created_by UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS books_created_by_idx ON books (created_by)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS books_author_idx ON books (author)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS verification_tokens (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        token TEXT NOT NULL UNIQUE,
        kind TEXT NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL,
        used_at TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS verification_tokens_user_kind_idx
        ON verification_tokens (user_id, kind)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS verification_tokens_expires_idx
        ON verification_tokens (expires_at)
    "#,
];

/// Runs the idempotent DDL statements.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub async fn ensure_schema(pool: &PgPool) -> StorageResult<()> {
    for statement in STATEMENTS {
        query(statement).execute(pool).await?;
    }
    tracing::debug!("Schema ensured");
    Ok(())
}

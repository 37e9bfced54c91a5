//! PostgreSQL storage backend for Shelfmark
//!
//! Provides persistent storage for:
//!
//! - Users (accounts, credentials, admin flags)
//! - Books (the catalog entities)
//! - Verification tokens (email verification, password reset)
//!
//! The relational store is the system of record for all of these; the cache
//! layer in the server crate is strictly a performance tier on top.
//!
//! # Example
//!
//! ```ignore
//! use shelfmark_postgres::ShelfStorage;
//!
//! let storage = ShelfStorage::connect("postgres://localhost/shelfmark", 10, 5_000).await?;
//! storage.ensure_schema().await?;
//!
//! let user = storage.users().find_by_email("reader@example.com").await?;
//! ```

pub mod adapters;
pub mod book;
pub mod schema;
pub mod user;
pub mod verification_token;

use std::sync::Arc;
use std::time::Duration;

use sqlx_core::pool::Pool;
use sqlx_postgres::Postgres;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

pub use adapters::{PgUserStore, PgVerificationTokenStore};
pub use book::{AuthorCount, BookStats, BookStorage};
pub use user::{UserStats, UserStorage};
pub use verification_token::VerificationTokenStorage;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx_core::Error),

    /// Requested row was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Row already exists (uniqueness violation).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invalid data read from or written to the store.
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl StorageError {
    /// Create a `NotFound` error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound(resource.into())
    }

    /// Create a `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create an `InvalidData` error.
    #[must_use]
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }

    /// Returns `true` if this is a `NotFound` error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` if this is a `Conflict` error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns `true` if this is a client error (4xx equivalent).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Conflict(_))
    }

    /// Returns `true` if this is a server error (5xx equivalent).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Database(_) | Self::InvalidData(_))
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// Shelf Storage
// =============================================================================

/// PostgreSQL storage backend.
///
/// Holds a connection pool and hands out specialized storage types for the
/// individual entities.
#[derive(Debug, Clone)]
pub struct ShelfStorage {
    pool: Arc<PgPool>,
}

impl ShelfStorage {
    /// Create new storage with an existing connection pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Create new storage by connecting to the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails.
    pub async fn connect(
        database_url: &str,
        pool_size: u32,
        connect_timeout_ms: u64,
    ) -> StorageResult<Self> {
        use sqlx_core::pool::PoolOptions;
        let pool = PoolOptions::<Postgres>::new()
            .max_connections(pool_size)
            .acquire_timeout(Duration::from_millis(connect_timeout_ms))
            .connect(database_url)
            .await?;
        Ok(Self::new(Arc::new(pool)))
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get a reference to the Arc-wrapped pool.
    #[must_use]
    pub fn pool_arc(&self) -> Arc<PgPool> {
        Arc::clone(&self.pool)
    }

    /// Create the tables and indexes if they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if any DDL statement fails.
    pub async fn ensure_schema(&self) -> StorageResult<()> {
        schema::ensure_schema(&self.pool).await
    }

    /// Liveness probe for health checks.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is unreachable.
    pub async fn ping(&self) -> StorageResult<()> {
        sqlx_core::query::query("SELECT 1")
            .execute(self.pool())
            .await?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Storage Accessors
    // -------------------------------------------------------------------------

    /// Get user storage operations.
    #[must_use]
    pub fn users(&self) -> UserStorage<'_> {
        UserStorage::new(&self.pool)
    }

    /// Get book storage operations.
    #[must_use]
    pub fn books(&self) -> BookStorage<'_> {
        BookStorage::new(&self.pool)
    }

    /// Get verification token storage operations.
    #[must_use]
    pub fn tokens(&self) -> VerificationTokenStorage<'_> {
        VerificationTokenStorage::new(&self.pool)
    }
}

// =============================================================================
// Tests
// =============================================================================

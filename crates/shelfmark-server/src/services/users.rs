//! User service.
//!
//! Single-user reads are cache-aside; admin listings always hit the store.
//! Deleting a user cascades to books and tokens in the store, destroys the
//! user's sessions, and clears every cache entry the account touched.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use shelfmark_auth::storage::SessionStore;
use shelfmark_core::{ApiError, ApiResult, PageParams, Paginated, Pagination, PublicUser};
use shelfmark_postgres::{ShelfStorage, UserStats};

use crate::cache::{CacheBackend, keys};
use crate::error::map_storage_error;

/// User reads and admin mutations.
pub struct UserService {
    storage: ShelfStorage,
    cache: CacheBackend,
    sessions: Arc<dyn SessionStore>,
    user_ttl: Duration,
    stats_ttl: Duration,
}

impl UserService {
    #[must_use]
    pub fn new(
        storage: ShelfStorage,
        cache: CacheBackend,
        sessions: Arc<dyn SessionStore>,
        user_ttl: Duration,
        stats_ttl: Duration,
    ) -> Self {
        Self {
            storage,
            cache,
            sessions,
            user_ttl,
            stats_ttl,
        }
    }

    /// Fetch a user's public projection, cache-aside.
    pub async fn get_public(&self, id: Uuid) -> ApiResult<PublicUser> {
        let key = keys::user_key(id);
        if let Some(user) = self.cache.get_json::<PublicUser>(&key).await {
            return Ok(user);
        }

        let user = self
            .storage
            .users()
            .find_by_id(id)
            .await
            .map_err(map_storage_error)?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        let public = user.to_public();
        self.cache.set_json(&key, &public, self.user_ttl).await;
        Ok(public)
    }

    /// Admin listing, newest first.
    pub async fn list(&self, params: PageParams) -> ApiResult<Paginated<PublicUser>> {
        let users = self
            .storage
            .users()
            .list(i64::from(params.limit), params.offset())
            .await
            .map_err(map_storage_error)?;
        let total = self
            .storage
            .users()
            .count()
            .await
            .map_err(map_storage_error)?;

        Ok(Paginated {
            data: users.iter().map(|u| u.to_public()).collect(),
            pagination: Pagination::new(params, total as u64),
        })
    }

    /// Admin delete: removes the account, its books and tokens (store
    /// cascade), destroys its sessions, and invalidates caches.
    pub async fn delete(&self, id: Uuid) -> ApiResult<()> {
        let owned_books = self
            .storage
            .books()
            .ids_by_owner(id)
            .await
            .map_err(map_storage_error)?;

        self.storage
            .users()
            .delete(id)
            .await
            .map_err(map_storage_error)?;

        if let Err(e) = self.sessions.destroy_all_for_user(id).await {
            tracing::warn!(user_id = %id, error = %e, "Session cleanup failed");
        }

        self.cache.delete(&keys::user_key(id)).await;
        for book_id in owned_books {
            self.cache.delete(&keys::book_key(book_id)).await;
        }
        self.cache.delete_by_pattern(keys::BOOK_LIST_PATTERN).await;
        self.cache.delete_by_pattern(keys::STATS_PATTERN).await;

        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    /// Admin toggle of the admin flag.
    pub async fn toggle_admin(&self, id: Uuid) -> ApiResult<PublicUser> {
        let user = self
            .storage
            .users()
            .find_by_id(id)
            .await
            .map_err(map_storage_error)?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        let updated = self
            .storage
            .users()
            .set_admin(id, !user.is_admin)
            .await
            .map_err(map_storage_error)?;

        self.invalidate(id).await;
        self.cache.delete_by_pattern(keys::STATS_PATTERN).await;

        tracing::info!(user_id = %id, is_admin = updated.is_admin, "Admin flag toggled");
        Ok(updated.to_public())
    }

    /// Aggregate stats, cached.
    pub async fn stats(&self) -> ApiResult<UserStats> {
        let key = keys::stats_key("users");
        if let Some(stats) = self.cache.get_json::<UserStats>(&key).await {
            return Ok(stats);
        }
        let stats = self
            .storage
            .users()
            .stats()
            .await
            .map_err(map_storage_error)?;
        self.cache.set_json(&key, &stats, self.stats_ttl).await;
        Ok(stats)
    }

    /// Drops the cached projection after an out-of-band user mutation
    /// (password change, email verification).
    pub async fn invalidate(&self, id: Uuid) {
        self.cache.delete(&keys::user_key(id)).await;
    }
}

//! Book service.
//!
//! Reads go cache-first with the relational store as fallback; every
//! mutation hits the store first and then *invalidates* (never updates) the
//! affected cache entries. An invalidation failure is logged and swallowed —
//! the committed store mutation stands, and staleness is bounded by TTL.

use std::time::Duration;

use time::OffsetDateTime;
use uuid::Uuid;

use shelfmark_core::{
    ApiError, ApiResult, Book, BookListQuery, Paginated, Pagination, model,
};
use shelfmark_postgres::{BookStats, ShelfStorage};

use crate::cache::{CacheBackend, keys};
use crate::error::map_storage_error;
use crate::uploads::ThumbnailStore;

/// An uploaded thumbnail file, not yet stored.
pub struct ThumbnailUpload {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

/// Fields for a new book.
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub description: String,
    pub rating: Option<f32>,
    pub thumbnail: Option<ThumbnailUpload>,
}

/// Partial update; absent fields keep their current value.
#[derive(Default)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub description: Option<String>,
    pub rating: Option<f32>,
    pub thumbnail: Option<ThumbnailUpload>,
}

/// Book CRUD over the store, cache, and thumbnail files.
pub struct BookService {
    storage: ShelfStorage,
    cache: CacheBackend,
    thumbnails: ThumbnailStore,
    book_ttl: Duration,
    list_ttl: Duration,
    stats_ttl: Duration,
}

impl BookService {
    #[must_use]
    pub fn new(
        storage: ShelfStorage,
        cache: CacheBackend,
        thumbnails: ThumbnailStore,
        book_ttl: Duration,
        list_ttl: Duration,
        stats_ttl: Duration,
    ) -> Self {
        Self {
            storage,
            cache,
            thumbnails,
            book_ttl,
            list_ttl,
            stats_ttl,
        }
    }

    /// Fetch a book, cache-aside.
    pub async fn get(&self, id: Uuid) -> ApiResult<Book> {
        let key = keys::book_key(id);
        if let Some(book) = self.cache.get_json::<Book>(&key).await {
            return Ok(book);
        }

        let book = self
            .storage
            .books()
            .find_by_id(id)
            .await
            .map_err(map_storage_error)?
            .ok_or_else(|| ApiError::not_found("Book not found"))?;

        self.cache.set_json(&key, &book, self.book_ttl).await;
        Ok(book)
    }

    /// List books, keyed on the full canonicalized query.
    pub async fn list(&self, query: &BookListQuery) -> ApiResult<Paginated<Book>> {
        let key = keys::book_list_key(query);
        if let Some(page) = self.cache.get_json::<Paginated<Book>>(&key).await {
            return Ok(page);
        }

        let (items, total) = self
            .storage
            .books()
            .list(query)
            .await
            .map_err(map_storage_error)?;
        let page = Paginated {
            data: items,
            pagination: Pagination::new(query.params, total),
        };

        self.cache.set_json(&key, &page, self.list_ttl).await;
        Ok(page)
    }

    /// Create a book owned by `owner_id`.
    pub async fn create(&self, owner_id: Uuid, input: NewBook) -> ApiResult<Book> {
        validate_title_author(&input.title, &input.author)?;
        validate_rating(input.rating)?;

        let thumbnail = match input.thumbnail {
            Some(upload) => Some(
                self.thumbnails
                    .save(upload.file_name.as_deref(), &upload.bytes)
                    .await?,
            ),
            None => None,
        };

        let now = OffsetDateTime::now_utc();
        let book = Book {
            id: Uuid::new_v4(),
            title: input.title,
            author: input.author,
            description: input.description,
            thumbnail: thumbnail.clone(),
            rating: input.rating,
            created_by: owner_id,
            created_at: now,
            updated_at: now,
        };

        let created = match self.storage.books().create(&book).await {
            Ok(created) => created,
            Err(e) => {
                // The store rejected the row; the just-written file has no
                // owner and gets cleaned up here.
                if let Some(path) = &thumbnail {
                    self.thumbnails.delete(path).await;
                }
                return Err(map_storage_error(e));
            }
        };

        self.invalidate_lists().await;
        tracing::debug!(book_id = %created.id, owner = %owner_id, "Book created");
        Ok(created)
    }

    /// Apply a partial update. Only the creator or an admin may modify.
    pub async fn update(
        &self,
        id: Uuid,
        requester_id: Uuid,
        requester_is_admin: bool,
        patch: BookPatch,
    ) -> ApiResult<Book> {
        validate_rating(patch.rating)?;

        let mut book = self
            .storage
            .books()
            .find_by_id(id)
            .await
            .map_err(map_storage_error)?
            .ok_or_else(|| ApiError::not_found("Book not found"))?;
        ensure_can_modify(&book, requester_id, requester_is_admin)?;

        if let Some(title) = patch.title {
            book.title = title;
        }
        if let Some(author) = patch.author {
            book.author = author;
        }
        validate_title_author(&book.title, &book.author)?;
        if let Some(description) = patch.description {
            book.description = description;
        }
        if let Some(rating) = patch.rating {
            book.rating = Some(rating);
        }

        let previous_thumbnail = book.thumbnail.clone();
        let new_thumbnail = match patch.thumbnail {
            Some(upload) => {
                let path = self
                    .thumbnails
                    .save(upload.file_name.as_deref(), &upload.bytes)
                    .await?;
                book.thumbnail = Some(path.clone());
                Some(path)
            }
            None => None,
        };

        let updated = match self.storage.books().update(&book).await {
            Ok(updated) => updated,
            Err(e) => {
                if let Some(path) = &new_thumbnail {
                    self.thumbnails.delete(path).await;
                }
                return Err(map_storage_error(e));
            }
        };

        // Replacement removes the previous file, best-effort.
        if new_thumbnail.is_some()
            && let Some(old) = previous_thumbnail
        {
            self.thumbnails.delete(&old).await;
        }

        self.cache.delete(&keys::book_key(id)).await;
        self.invalidate_lists().await;
        tracing::debug!(book_id = %id, "Book updated");
        Ok(updated)
    }

    /// Delete a book. Only the creator or an admin may delete.
    pub async fn delete(
        &self,
        id: Uuid,
        requester_id: Uuid,
        requester_is_admin: bool,
    ) -> ApiResult<()> {
        let book = self
            .storage
            .books()
            .find_by_id(id)
            .await
            .map_err(map_storage_error)?
            .ok_or_else(|| ApiError::not_found("Book not found"))?;
        ensure_can_modify(&book, requester_id, requester_is_admin)?;

        let deleted = self
            .storage
            .books()
            .delete(id)
            .await
            .map_err(map_storage_error)?;

        if let Some(path) = &deleted.thumbnail {
            self.thumbnails.delete(path).await;
        }

        self.cache.delete(&keys::book_key(id)).await;
        self.invalidate_lists().await;
        tracing::debug!(book_id = %id, "Book deleted");
        Ok(())
    }

    /// Aggregate stats, cached.
    pub async fn stats(&self) -> ApiResult<BookStats> {
        let key = keys::stats_key("books");
        if let Some(stats) = self.cache.get_json::<BookStats>(&key).await {
            return Ok(stats);
        }
        let stats = self
            .storage
            .books()
            .stats()
            .await
            .map_err(map_storage_error)?;
        self.cache.set_json(&key, &stats, self.stats_ttl).await;
        Ok(stats)
    }

    /// List pages and stats are unenumerable by exact key; writes clear the
    /// whole namespace.
    async fn invalidate_lists(&self) {
        self.cache.delete_by_pattern(keys::BOOK_LIST_PATTERN).await;
        self.cache.delete_by_pattern(keys::STATS_PATTERN).await;
    }
}

/// Permission rule: creator or admin; violation is an authorization error,
/// not a not-found.
fn ensure_can_modify(book: &Book, requester_id: Uuid, is_admin: bool) -> ApiResult<()> {
    if book.can_be_modified_by(requester_id, is_admin) {
        Ok(())
    } else {
        Err(ApiError::authorization(
            "Only the book's creator or an admin can modify it",
        ))
    }
}

fn validate_rating(rating: Option<f32>) -> ApiResult<()> {
    if let Some(rating) = rating
        && let Err(message) = model::validate_rating(rating)
    {
        return Err(ApiError::validation_with_details(
            "Invalid book fields",
            serde_json::json!({ "rating": message }),
        ));
    }
    Ok(())
}

fn validate_title_author(title: &str, author: &str) -> ApiResult<()> {
    let mut details = serde_json::Map::new();
    if title.trim().is_empty() {
        details.insert("title".into(), "title must not be empty".into());
    }
    if author.trim().is_empty() {
        details.insert("author".into(), "author must not be empty".into());
    }
    if details.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation_with_details(
            "Invalid book fields",
            serde_json::Value::Object(details),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_book(owner: Uuid) -> Book {
        let now = OffsetDateTime::now_utc();
        Book {
            id: Uuid::new_v4(),
            title: "Dune".to_string(),
            author: "Frank Herbert".to_string(),
            description: String::new(),
            thumbnail: None,
            rating: None,
            created_by: owner,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_ownership_rule() {
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let book = sample_book(owner);

        assert!(ensure_can_modify(&book, owner, false).is_ok());
        assert!(ensure_can_modify(&book, other, true).is_ok());

        let err = ensure_can_modify(&book, other, false).unwrap_err();
        // Authorization, not not-found: existence is not hidden here.
        assert_eq!(err.status_code(), 403);
    }

    #[test]
    fn test_rating_validation() {
        assert!(validate_rating(None).is_ok());
        assert!(validate_rating(Some(1.0)).is_ok());
        assert!(validate_rating(Some(5.0)).is_ok());

        for bad in [0.99, 5.01, -1.0] {
            let err = validate_rating(Some(bad)).unwrap_err();
            assert_eq!(err.status_code(), 400, "accepted {bad}");
        }
    }

    #[test]
    fn test_title_author_validation() {
        assert!(validate_title_author("Dune", "Frank Herbert").is_ok());
        let err = validate_title_author("  ", "Frank Herbert").unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert!(validate_title_author("Dune", "").is_err());
    }
}

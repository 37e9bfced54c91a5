//! Book storage.
//!
//! List queries compose their WHERE clause dynamically from the filter
//! tuple; sort columns come from the whitelisted [`shelfmark_core::BookSort`]
//! enum, so no caller-supplied identifier ever reaches the SQL text.

use serde::{Deserialize, Serialize};
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{PgPool, StorageError, StorageResult};
use shelfmark_core::{Book, BookListQuery, BookSort};

// =============================================================================
// Types
// =============================================================================

type BookTuple = (
    Uuid,
    String,
    String,
    String,
    Option<String>,
    Option<f32>,
    Uuid,
    OffsetDateTime,
    OffsetDateTime,
);

const BOOK_COLUMNS: &str =
    "id, title, author, description, thumbnail, rating, created_by, created_at, updated_at";

fn book_from_tuple(row: BookTuple) -> Book {
    Book {
        id: row.0,
        title: row.1,
        author: row.2,
        description: row.3,
        thumbnail: row.4,
        rating: row.5,
        created_by: row.6,
        created_at: row.7,
        updated_at: row.8,
    }
}

/// Author leaderboard entry for the stats endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorCount {
    pub author: String,
    pub count: i64,
}

/// Aggregate counters for the admin stats endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BookStats {
    pub total: i64,
    pub rated: i64,
    pub average_rating: Option<f64>,
    pub top_authors: Vec<AuthorCount>,
}

/// Escapes LIKE metacharacters in user-supplied search input.
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

// =============================================================================
// Book Storage
// =============================================================================

/// Book storage operations.
pub struct BookStorage<'a> {
    pool: &'a PgPool,
}

impl<'a> BookStorage<'a> {
    /// Create a new book storage with a connection pool reference.
    #[must_use]
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create a new book.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create(&self, book: &Book) -> StorageResult<Book> {
        let row: BookTuple = query_as(&format!(
            r#"
            INSERT INTO books (id, title, author, description, thumbnail, rating,
                               created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {BOOK_COLUMNS}
            "#
        ))
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.description)
        .bind(&book.thumbnail)
        .bind(book.rating)
        .bind(book.created_by)
        .bind(book.created_at)
        .bind(book.updated_at)
        .fetch_one(self.pool)
        .await?;

        Ok(book_from_tuple(row))
    }

    /// Find a book by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> StorageResult<Option<Book>> {
        let row: Option<BookTuple> = query_as(&format!(
            r#"
            SELECT {BOOK_COLUMNS}
            FROM books
            WHERE id = $1
            "#
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(book_from_tuple))
    }

    /// Write back a modified book (full row, last write wins).
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the book does not exist.
    pub async fn update(&self, book: &Book) -> StorageResult<Book> {
        let row: Option<BookTuple> = query_as(&format!(
            r#"
            UPDATE books
            SET title = $2,
                author = $3,
                description = $4,
                thumbnail = $5,
                rating = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {BOOK_COLUMNS}
            "#
        ))
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.description)
        .bind(&book.thumbnail)
        .bind(book.rating)
        .fetch_optional(self.pool)
        .await?;

        row.map(book_from_tuple)
            .ok_or_else(|| StorageError::not_found(format!("Book {}", book.id)))
    }

    /// Delete a book, returning the deleted row (the caller still needs the
    /// thumbnail path for file cleanup).
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when the book does not exist.
    pub async fn delete(&self, id: Uuid) -> StorageResult<Book> {
        let row: Option<BookTuple> = query_as(&format!(
            r#"
            DELETE FROM books
            WHERE id = $1
            RETURNING {BOOK_COLUMNS}
            "#
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        row.map(book_from_tuple)
            .ok_or_else(|| StorageError::not_found(format!("Book {id}")))
    }

    /// List books matching the filter, with the total match count.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails.
    pub async fn list(&self, params: &BookListQuery) -> StorageResult<(Vec<Book>, u64)> {
        let mut conditions: Vec<String> = Vec::new();
        let mut idx = 0usize;

        let search_pattern = params
            .search
            .as_ref()
            .map(|s| format!("%{}%", escape_like(s)));
        if search_pattern.is_some() {
            idx += 1;
            conditions.push(format!("(title ILIKE ${idx} OR author ILIKE ${idx})"));
        }

        let author_pattern = params
            .author
            .as_ref()
            .map(|a| format!("%{}%", escape_like(a)));
        if author_pattern.is_some() {
            idx += 1;
            conditions.push(format!("author ILIKE ${idx}"));
        }

        if params.min_rating.is_some() {
            idx += 1;
            conditions.push(format!("rating >= ${idx}"));
        }
        if params.max_rating.is_some() {
            idx += 1;
            conditions.push(format!("rating <= ${idx}"));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let count_sql = format!("SELECT COUNT(*) FROM books {where_clause}");
        let mut count_query = query_scalar(&count_sql);
        if let Some(p) = &search_pattern {
            count_query = count_query.bind(p.as_str());
        }
        if let Some(p) = &author_pattern {
            count_query = count_query.bind(p.as_str());
        }
        if let Some(r) = params.min_rating {
            count_query = count_query.bind(r);
        }
        if let Some(r) = params.max_rating {
            count_query = count_query.bind(r);
        }
        let total: i64 = count_query.fetch_one(self.pool).await?;

        // Unrated books always sort last when ordering by rating.
        let nulls = if params.sort_by == BookSort::Rating {
            " NULLS LAST"
        } else {
            ""
        };
        let list_sql = format!(
            "SELECT {BOOK_COLUMNS} FROM books {where_clause} \
             ORDER BY {col} {dir}{nulls}, id ASC LIMIT ${limit_idx} OFFSET ${offset_idx}",
            col = params.sort_by.as_column(),
            dir = params.sort_order.as_sql(),
            limit_idx = idx + 1,
            offset_idx = idx + 2,
        );
        let mut list_query = query_as(&list_sql);
        if let Some(p) = &search_pattern {
            list_query = list_query.bind(p.as_str());
        }
        if let Some(p) = &author_pattern {
            list_query = list_query.bind(p.as_str());
        }
        if let Some(r) = params.min_rating {
            list_query = list_query.bind(r);
        }
        if let Some(r) = params.max_rating {
            list_query = list_query.bind(r);
        }
        let rows: Vec<BookTuple> = list_query
            .bind(i64::from(params.params.limit))
            .bind(params.params.offset())
            .fetch_all(self.pool)
            .await?;

        Ok((
            rows.into_iter().map(book_from_tuple).collect(),
            total as u64,
        ))
    }

    /// Ids of every book owned by the user, for cache invalidation before a
    /// cascading delete.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn ids_by_owner(&self, user_id: Uuid) -> StorageResult<Vec<Uuid>> {
        let ids: Vec<(Uuid,)> = query_as("SELECT id FROM books WHERE created_by = $1")
            .bind(user_id)
            .fetch_all(self.pool)
            .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    /// Count all books.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count(&self) -> StorageResult<i64> {
        let count: i64 = query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Aggregate counters for the admin stats endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails.
    pub async fn stats(&self) -> StorageResult<BookStats> {
        let totals: (i64, i64, Option<f64>) = query_as(
            r#"
            SELECT COUNT(*),
                   COUNT(rating),
                   AVG(rating)::float8
            FROM books
            "#,
        )
        .fetch_one(self.pool)
        .await?;

        let authors: Vec<(String, i64)> = query_as(
            r#"
            SELECT author, COUNT(*)
            FROM books
            GROUP BY author
            ORDER BY COUNT(*) DESC, author ASC
            LIMIT 5
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(BookStats {
            total: totals.0,
            rated: totals.1,
            average_rating: totals.2,
            top_authors: authors
                .into_iter()
                .map(|(author, count)| AuthorCount { author, count })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("under_score"), "under\\_score");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("plain"), "plain");
    }
}

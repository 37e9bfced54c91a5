//! Pagination parameters, page metadata, and list-query canonicalization.

use serde::{Deserialize, Serialize};

/// Default page size when the caller does not ask for one.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;
/// Hard ceiling on page size.
pub const MAX_PAGE_LIMIT: u32 = 100;

// =============================================================================
// Page parameters
// =============================================================================

/// Sanitized 1-based page/limit pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    pub page: u32,
    pub limit: u32,
}

impl PageParams {
    /// Clamps raw query values into valid bounds: page >= 1,
    /// 1 <= limit <= [`MAX_PAGE_LIMIT`].
    #[must_use]
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(DEFAULT_PAGE_LIMIT)
                .clamp(1, MAX_PAGE_LIMIT),
        }
    }

    /// Row offset for SQL `OFFSET`.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self::new(None, None)
    }
}

// =============================================================================
// Page metadata
// =============================================================================

/// Page metadata returned alongside every list response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total_items: u64,
    pub total_pages: u32,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    /// Computes page metadata from the request and the total row count.
    #[must_use]
    pub fn new(params: PageParams, total_items: u64) -> Self {
        let total_pages = if total_items == 0 {
            0
        } else {
            total_items.div_ceil(u64::from(params.limit)) as u32
        };
        Self {
            page: params.page,
            limit: params.limit,
            total_items,
            total_pages,
            has_next_page: params.page < total_pages,
            has_prev_page: params.page > 1 && total_pages > 0,
        }
    }
}

/// A page of results plus its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub pagination: Pagination,
}

// =============================================================================
// Book list query
// =============================================================================

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// SQL keyword for this direction.
    #[must_use]
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Whitelisted sort columns for book listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookSort {
    #[default]
    CreatedAt,
    Title,
    Author,
    Rating,
}

impl BookSort {
    /// The column name used in ORDER BY. Only these four are ever
    /// interpolated into SQL.
    #[must_use]
    pub fn as_column(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Title => "title",
            Self::Author => "author",
            Self::Rating => "rating",
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::Title => "title",
            Self::Author => "author",
            Self::Rating => "rating",
        }
    }

    /// Parses the query-string form (`createdAt`, `title`, ...).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created_at" | "createdAt" => Some(Self::CreatedAt),
            "title" => Some(Self::Title),
            "author" => Some(Self::Author),
            "rating" => Some(Self::Rating),
            _ => None,
        }
    }
}

/// The full filter/sort/pagination tuple for a book list request.
///
/// The canonical key ties the list cache to the exact query shape: two
/// requests hit the same cache entry iff every component matches.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BookListQuery {
    pub params: PageParams,
    pub search: Option<String>,
    pub author: Option<String>,
    pub min_rating: Option<f32>,
    pub max_rating: Option<f32>,
    pub sort_by: BookSort,
    pub sort_order: SortOrder,
}

impl BookListQuery {
    /// Canonical cache-key fragment for this query.
    ///
    /// Optional components render as an empty slot so `a=None` and
    /// `a=Some("")` cannot collide with neighbouring fields.
    #[must_use]
    pub fn canonical_key(&self) -> String {
        format!(
            "p={};l={};q={};a={};min={};max={};sort={};order={}",
            self.params.page,
            self.params.limit,
            self.search.as_deref().unwrap_or(""),
            self.author.as_deref().unwrap_or(""),
            self.min_rating.map(|r| r.to_string()).unwrap_or_default(),
            self.max_rating.map(|r| r.to_string()).unwrap_or_default(),
            self.sort_by.as_str(),
            self.sort_order.as_str(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params_clamping() {
        let p = PageParams::new(Some(0), Some(0));
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, 1);

        let p = PageParams::new(None, Some(10_000));
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, MAX_PAGE_LIMIT);

        let p = PageParams::new(Some(3), None);
        assert_eq!(p.offset(), 20);
    }

    #[test]
    fn test_pagination_math() {
        // 25 books, 10 per page -> 3 pages.
        let p = Pagination::new(PageParams::new(Some(1), Some(10)), 25);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next_page);
        assert!(!p.has_prev_page);

        let p = Pagination::new(PageParams::new(Some(3), Some(10)), 25);
        assert!(!p.has_next_page);
        assert!(p.has_prev_page);
    }

    #[test]
    fn test_pagination_empty() {
        let p = Pagination::new(PageParams::default(), 0);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next_page);
        assert!(!p.has_prev_page);
    }

    #[test]
    fn test_canonical_key_distinguishes_queries() {
        let base = BookListQuery::default();
        let mut filtered = BookListQuery::default();
        filtered.author = Some("Herbert".to_string());
        assert_ne!(base.canonical_key(), filtered.canonical_key());

        let mut paged = BookListQuery::default();
        paged.params = PageParams::new(Some(2), None);
        assert_ne!(base.canonical_key(), paged.canonical_key());
    }

    #[test]
    fn test_canonical_key_stable() {
        let q = BookListQuery {
            params: PageParams::new(Some(2), Some(20)),
            search: Some("dune".to_string()),
            author: None,
            min_rating: Some(3.0),
            max_rating: None,
            sort_by: BookSort::Rating,
            sort_order: SortOrder::Asc,
        };
        assert_eq!(
            q.canonical_key(),
            "p=2;l=20;q=dune;a=;min=3;max=;sort=rating;order=asc"
        );
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!(BookSort::parse("createdAt"), Some(BookSort::CreatedAt));
        assert_eq!(BookSort::parse("rating"), Some(BookSort::Rating));
        assert_eq!(BookSort::parse("password_hash"), None);
    }
}

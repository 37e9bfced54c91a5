//! Core domain types for the Shelfmark catalog server.
//!
//! This crate carries the pieces every other crate agrees on: the domain
//! model (users, books, verification tokens), pagination math, and the
//! error taxonomy with its pure HTTP status mapping. It deliberately has no
//! transport or storage dependencies.

pub mod error;
pub mod model;
pub mod pagination;

pub use error::{ApiError, ApiResult, ErrorBody};
pub use model::{
    Book, PublicUser, TokenKind, User, VerificationToken, RATING_MAX, RATING_MIN,
};
pub use pagination::{BookListQuery, BookSort, PageParams, Paginated, Pagination, SortOrder};

//! Entity services: cache-aside reads, invalidate-after-write mutations.

pub mod books;
pub mod users;

pub use books::{BookPatch, BookService, NewBook, ThumbnailUpload};
pub use users::UserService;

//! Request-gating extractors built on the token lifecycle.

pub mod auth;
pub mod error;
pub mod types;

pub use auth::{AdminAuth, AuthState, BearerAuth, OptionalBearerAuth};
pub use types::CurrentUser;

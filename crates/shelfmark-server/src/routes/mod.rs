//! HTTP route handlers.

pub mod admin;
pub mod auth;
pub mod books;
pub mod health;
pub mod users;

use serde::Serialize;

/// Body for operations whose only payload is a confirmation.
#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

//! Shelfmark HTTP server.
//!
//! Wires the storage backend, cache layer, auth stack, mail transport, and
//! entity services into an axum application. See [`server::run`] for the
//! composition root.

pub mod cache;
pub mod config;
pub mod error;
pub mod mail;
pub mod maintenance;
pub mod middleware;
pub mod observability;
pub mod routes;
pub mod server;
pub mod services;
pub mod state;
pub mod uploads;

pub use server::{build_router, run};
pub use state::AppState;

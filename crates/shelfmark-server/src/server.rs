//! Router assembly and server entry.

use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::maintenance;
use crate::middleware::rate_limit;
use crate::routes::{admin, auth, books, health, users};
use crate::state::AppState;

/// Builds the full application router.
pub fn build_router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password", post(auth::reset_password))
        .route("/verify-email", post(auth::verify_email))
        .route_layer(from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .nest("/auth", auth_routes)
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/stats", get(books::book_stats))
        .route(
            "/books/{id}",
            get(books::get_book)
                .patch(books::update_book)
                .delete(books::delete_book),
        )
        .route("/users", get(users::list_users))
        .route("/users/me", get(users::me))
        .route("/users/stats", get(users::user_stats))
        .route(
            "/users/{id}",
            get(users::get_user).delete(users::delete_user),
        )
        .route("/users/{id}/toggle-admin", patch(users::toggle_admin))
        .route("/admin/cache", delete(admin::flush_cache))
        .route("/health", get(health::health))
        .nest_service(
            "/uploads",
            ServeDir::new(&state.config.uploads.dir),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.server.cors_origins))
        .layer(DefaultBodyLimit::max(state.config.uploads.max_bytes))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Connects dependencies, starts maintenance, and serves until shutdown.
pub async fn run(config: AppConfig) -> Result<(), String> {
    let state = AppState::build(config).await?;

    let sweep = maintenance::spawn_token_sweep(
        state.verification.clone(),
        state.config.maintenance.token_sweep_interval_secs,
    );

    let addr = state.config.addr();
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("bind {addr} failed: {e}"))?;
    tracing::info!(%addr, "Shelfmark server listening");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| format!("server error: {e}"))?;

    sweep.abort();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}

//! Health endpoint with per-dependency status.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub database: &'static str,
    pub cache: &'static str,
}

/// `GET /health`
///
/// The database is load-bearing: when it is down the service is down. The
/// cache is a performance tier, so its failure is reported but does not
/// turn the response into a 503.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database_up = match state.storage.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check: database unreachable");
            false
        }
    };
    let cache_up = state.cache.ping().await;

    let status = if database_up && cache_up {
        "ok"
    } else {
        "degraded"
    };
    let code = if database_up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(HealthResponse {
            status,
            checks: HealthChecks {
                database: if database_up { "up" } else { "down" },
                cache: if cache_up { "up" } else { "down" },
            },
        }),
    )
}

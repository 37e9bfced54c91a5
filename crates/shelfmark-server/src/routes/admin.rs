//! Admin cache tooling.

use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use shelfmark_auth::middleware::AdminAuth;
use shelfmark_core::ApiError;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CacheFlushParams {
    pub pattern: String,
}

#[derive(Serialize)]
pub struct CacheFlushResponse {
    pub deleted: u64,
}

/// `DELETE /admin/cache?pattern=<glob>` (admin)
///
/// Explicit invalidation for operational recovery, e.g. after a manual
/// database edit. The pattern uses the same `*` globs as internal
/// invalidation.
pub async fn flush_cache(
    State(state): State<AppState>,
    AdminAuth(current): AdminAuth,
    Query(params): Query<CacheFlushParams>,
) -> AppResult<Json<CacheFlushResponse>> {
    if params.pattern.trim().is_empty() {
        return Err(AppError(ApiError::validation("pattern must not be empty")));
    }
    let deleted = state.cache.delete_by_pattern(params.pattern.trim()).await;
    tracing::info!(admin = %current.id(), pattern = %params.pattern, deleted, "Cache flushed");
    Ok(Json(CacheFlushResponse { deleted }))
}

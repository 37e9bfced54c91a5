//! User endpoints: self-service reads plus the admin management surface.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use uuid::Uuid;

use shelfmark_auth::middleware::{AdminAuth, BearerAuth};
use shelfmark_core::{ApiError, PageParams, Paginated, PublicUser};
use shelfmark_postgres::UserStats;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

use super::MessageResponse;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// `GET /users/me`
pub async fn me(BearerAuth(current): BearerAuth) -> Json<PublicUser> {
    Json(current.user.to_public())
}

/// `GET /users/{id}` — self or admin.
pub async fn get_user(
    State(state): State<AppState>,
    BearerAuth(current): BearerAuth,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PublicUser>> {
    if current.id() != id && !current.is_admin() {
        return Err(AppError(ApiError::authorization(
            "You can only view your own profile",
        )));
    }
    let user = state.users.get_public(id).await?;
    Ok(Json(user))
}

/// `GET /users` (admin)
pub async fn list_users(
    State(state): State<AppState>,
    AdminAuth(_current): AdminAuth,
    Query(params): Query<PageQuery>,
) -> AppResult<Json<Paginated<PublicUser>>> {
    let page = state
        .users
        .list(PageParams::new(params.page, params.limit))
        .await?;
    Ok(Json(page))
}

/// `DELETE /users/{id}` (admin)
pub async fn delete_user(
    State(state): State<AppState>,
    AdminAuth(current): AdminAuth,
    Path(id): Path<Uuid>,
) -> AppResult<Json<MessageResponse>> {
    if current.id() == id {
        return Err(AppError(ApiError::validation(
            "Admins cannot delete their own account",
        )));
    }
    state.users.delete(id).await?;
    Ok(Json(MessageResponse {
        message: "User deleted",
    }))
}

/// `PATCH /users/{id}/toggle-admin` (admin)
pub async fn toggle_admin(
    State(state): State<AppState>,
    AdminAuth(current): AdminAuth,
    Path(id): Path<Uuid>,
) -> AppResult<Json<PublicUser>> {
    if current.id() == id {
        return Err(AppError(ApiError::validation(
            "Admins cannot change their own admin flag",
        )));
    }
    let user = state.users.toggle_admin(id).await?;
    Ok(Json(user))
}

/// `GET /users/stats` (admin)
pub async fn user_stats(
    State(state): State<AppState>,
    AdminAuth(_current): AdminAuth,
) -> AppResult<Json<UserStats>> {
    let stats = state.users.stats().await?;
    Ok(Json(stats))
}

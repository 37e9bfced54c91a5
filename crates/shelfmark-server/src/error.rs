//! HTTP boundary error wrapper.
//!
//! `ApiError` stays transport-free in `shelfmark-core`; this wrapper is the
//! one place that turns it (and the storage/auth error types) into an HTTP
//! response.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use shelfmark_auth::AuthError;
use shelfmark_core::ApiError;
use shelfmark_postgres::StorageError;

/// Response-producing wrapper around [`ApiError`].
#[derive(Debug)]
pub struct AppError(pub ApiError);

/// Result type for route handlers.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.0.is_server_error() {
            tracing::error!(error = %self.0, "Request failed");
        } else {
            tracing::debug!(error = %self.0, "Request rejected");
        }
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0.to_body())).into_response()
    }
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        Self(map_auth_error(err))
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        Self(map_storage_error(err))
    }
}

/// Maps auth-layer errors onto the API taxonomy.
pub fn map_auth_error(err: AuthError) -> ApiError {
    match err {
        AuthError::Unauthorized { message } | AuthError::InvalidToken { message } => {
            ApiError::authentication(message)
        }
        AuthError::TokenExpired => ApiError::authentication("Token has expired"),
        AuthError::TokenRevoked => ApiError::authentication("Token has been revoked"),
        AuthError::Forbidden { message } => ApiError::authorization(message),
        AuthError::Storage { message } | AuthError::Internal { message } => {
            ApiError::internal(message)
        }
    }
}

/// Maps storage errors onto the API taxonomy.
pub fn map_storage_error(err: StorageError) -> ApiError {
    match err {
        StorageError::NotFound(message) => ApiError::not_found(message),
        StorageError::Conflict(message) => ApiError::conflict(message),
        StorageError::Database(e) => ApiError::internal(e.to_string()),
        StorageError::InvalidData(message) => ApiError::internal(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_mapping() {
        assert_eq!(
            map_auth_error(AuthError::TokenRevoked).status_code(),
            401
        );
        assert_eq!(
            map_auth_error(AuthError::forbidden("nope")).status_code(),
            403
        );
        assert_eq!(
            map_auth_error(AuthError::storage("db down")).status_code(),
            500
        );
    }

    #[test]
    fn test_storage_error_mapping() {
        assert_eq!(
            map_storage_error(StorageError::not_found("Book x")).status_code(),
            404
        );
        assert_eq!(
            map_storage_error(StorageError::conflict("dup")).status_code(),
            409
        );
        assert_eq!(
            map_storage_error(StorageError::invalid_data("bad kind")).status_code(),
            500
        );
    }

    #[tokio::test]
    async fn test_response_status() {
        let response = AppError(ApiError::not_found("Book x")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

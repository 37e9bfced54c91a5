//! Error response handling for authentication extractors.
//!
//! Implements `IntoResponse` for `AuthError` so extractor rejections render
//! the same JSON error body as the rest of the API.

use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::error::AuthError;
use shelfmark_core::ErrorBody;

// =============================================================================
// IntoResponse Implementation
// =============================================================================

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = error_details(&self);

        if status.is_server_error() {
            tracing::error!(error = %self, "Auth middleware server error");
        }

        let body = ErrorBody {
            error: code,
            message,
            details: None,
        };

        let mut headers = HeaderMap::new();
        if status == StatusCode::UNAUTHORIZED {
            let www_auth = build_www_authenticate_header(code, &body.message);
            if let Ok(value) = HeaderValue::from_str(&www_auth) {
                headers.insert(header::WWW_AUTHENTICATE, value);
            }
        }

        (status, headers, Json(body)).into_response()
    }
}

/// Extracts response details from an `AuthError`.
///
/// Returns (HTTP status, stable error code, message). Server-side causes
/// are replaced with a generic message.
fn error_details(error: &AuthError) -> (StatusCode, &'static str, String) {
    match error {
        AuthError::Unauthorized { message } => (
            StatusCode::UNAUTHORIZED,
            "authentication_error",
            message.clone(),
        ),
        AuthError::InvalidToken { message } => (
            StatusCode::UNAUTHORIZED,
            "authentication_error",
            message.clone(),
        ),
        AuthError::TokenExpired => (
            StatusCode::UNAUTHORIZED,
            "authentication_error",
            "Token has expired".to_string(),
        ),
        AuthError::TokenRevoked => (
            StatusCode::UNAUTHORIZED,
            "authentication_error",
            "Token has been revoked".to_string(),
        ),
        AuthError::Forbidden { message } => (
            StatusCode::FORBIDDEN,
            "authorization_error",
            message.clone(),
        ),
        AuthError::Storage { .. } | AuthError::Internal { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "Internal server error".to_string(),
        ),
    }
}

/// Builds the WWW-Authenticate header value for 401 responses.
fn build_www_authenticate_header(error: &str, description: &str) -> String {
    let escaped_desc = description.replace('\"', "\\\"");
    format!(
        "Bearer realm=\"shelfmark\", error=\"{}\", error_description=\"{}\"",
        error, escaped_desc
    )
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn test_unauthorized_response() {
        let error = AuthError::unauthorized("Missing Authorization header");
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let www_auth = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(www_auth.contains("Bearer"));
        assert!(www_auth.contains("realm=\"shelfmark\""));
    }

    #[tokio::test]
    async fn test_forbidden_has_no_www_authenticate() {
        let response = AuthError::forbidden("Admin access required").into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(!response.headers().contains_key(header::WWW_AUTHENTICATE));
    }

    #[tokio::test]
    async fn test_storage_error_is_masked() {
        let response = AuthError::storage("connection refused").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "internal_error");
        assert_eq!(json["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_body_shape() {
        let response = AuthError::TokenRevoked.into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "authentication_error");
        assert_eq!(json["message"], "Token has been revoked");
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_www_authenticate_header_escaping() {
        let header = build_www_authenticate_header("authentication_error", "has \"quotes\"");
        assert!(header.contains("\\\"quotes\\\""));
    }
}

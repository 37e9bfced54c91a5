//! Error taxonomy shared across the Shelfmark crates.
//!
//! `ApiError` is a plain tagged union used for signaling; the HTTP-facing
//! mapping (`status_code`, `error_code`, `to_body`) is a pure function of
//! the variant so the transport layer never needs to inspect error internals.

use serde::Serialize;

/// Errors surfaced to API callers, one variant per response class.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed or out-of-range input. Maps to 400.
    #[error("Validation failed: {message}")]
    Validation {
        /// Description of what failed validation.
        message: String,
        /// Optional field-level details, serialized into the response body.
        details: Option<serde_json::Value>,
    },

    /// Missing, invalid, expired, or revoked credential. Maps to 401.
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Description of the authentication failure.
        message: String,
    },

    /// Authenticated but lacking permission. Maps to 403.
    #[error("Forbidden: {message}")]
    Authorization {
        /// Description of the missing permission.
        message: String,
    },

    /// Referenced entity does not exist. Maps to 404.
    #[error("Not found: {message}")]
    NotFound {
        /// Description of what was not found.
        message: String,
    },

    /// Uniqueness or state conflict. Maps to 409.
    #[error("Conflict: {message}")]
    Conflict {
        /// Description of the conflict.
        message: String,
    },

    /// Too many requests inside the current window. Maps to 429.
    #[error("Rate limited: {message}")]
    RateLimited {
        /// Description of the limit that was hit.
        message: String,
    },

    /// Anything unclassified: store unavailability, unexpected failures.
    /// Maps to 500; the message is never echoed to the caller.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error (logs only).
        message: String,
    },
}

impl ApiError {
    /// Creates a new `Validation` error without field details.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    /// Creates a new `Validation` error with field-level details.
    #[must_use]
    pub fn validation_with_details(
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            details: Some(details),
        }
    }

    /// Creates a new `Authentication` error.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Creates a new `Authorization` error.
    #[must_use]
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::Authorization {
            message: message.into(),
        }
    }

    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Creates a new `RateLimited` error.
    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Internal { .. })
    }

    /// Returns `true` if this is a server error (5xx category).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Authentication { .. } => 401,
            Self::Authorization { .. } => 403,
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::RateLimited { .. } => 429,
            Self::Internal { .. } => 500,
        }
    }

    /// Stable machine-readable error code for the response body.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::Authentication { .. } => "authentication_error",
            Self::Authorization { .. } => "authorization_error",
            Self::NotFound { .. } => "not_found",
            Self::Conflict { .. } => "conflict",
            Self::RateLimited { .. } => "rate_limited",
            Self::Internal { .. } => "internal_error",
        }
    }

    /// Builds the wire body for this error.
    ///
    /// Internal errors get a generic message; their real cause stays in the
    /// logs.
    #[must_use]
    pub fn to_body(&self) -> ErrorBody {
        let message = match self {
            Self::Internal { .. } => "Internal server error".to_string(),
            Self::Validation { message, .. }
            | Self::Authentication { message }
            | Self::Authorization { message }
            | Self::NotFound { message }
            | Self::Conflict { message }
            | Self::RateLimited { message } => message.clone(),
        };
        let details = match self {
            Self::Validation { details, .. } => details.clone(),
            _ => None,
        };
        ErrorBody {
            error: self.error_code(),
            message,
            details,
        }
    }
}

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// JSON body sent for every error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    /// Stable machine-readable error code.
    pub error: &'static str,
    /// Short human-readable message.
    pub message: String,
    /// Optional structured details (field-level validation errors).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::validation("bad").status_code(), 400);
        assert_eq!(ApiError::authentication("no").status_code(), 401);
        assert_eq!(ApiError::authorization("no").status_code(), 403);
        assert_eq!(ApiError::not_found("gone").status_code(), 404);
        assert_eq!(ApiError::conflict("dup").status_code(), 409);
        assert_eq!(ApiError::rate_limited("slow down").status_code(), 429);
        assert_eq!(ApiError::internal("boom").status_code(), 500);
    }

    #[test]
    fn test_error_predicates() {
        assert!(ApiError::validation("bad").is_client_error());
        assert!(!ApiError::validation("bad").is_server_error());
        assert!(ApiError::internal("boom").is_server_error());
        assert!(!ApiError::internal("boom").is_client_error());
    }

    #[test]
    fn test_internal_message_is_suppressed() {
        let err = ApiError::internal("connection refused to 10.0.0.3");
        let body = err.to_body();
        assert_eq!(body.message, "Internal server error");
        assert_eq!(body.error, "internal_error");
    }

    #[test]
    fn test_validation_details_carried() {
        let err = ApiError::validation_with_details(
            "invalid fields",
            serde_json::json!({"rating": "must be between 1 and 5"}),
        );
        let body = err.to_body();
        assert_eq!(body.error, "validation_error");
        assert!(body.details.is_some());
    }

    #[test]
    fn test_display() {
        let err = ApiError::conflict("email already registered");
        assert_eq!(err.to_string(), "Conflict: email already registered");
    }
}

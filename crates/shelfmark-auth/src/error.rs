//! Authentication and authorization error types.

/// Errors that can occur during authentication and authorization operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request lacks valid authentication credentials.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Description of why the request is unauthorized.
        message: String,
    },

    /// The token is invalid, malformed, or references a missing user.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// The token has been explicitly blacklisted.
    #[error("Token revoked")]
    TokenRevoked,

    /// The authenticated user does not have permission to perform the action.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Description of why access is forbidden.
        message: String,
    },

    /// An error occurred while storing or retrieving auth data.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `Unauthorized` error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `Forbidden` error.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
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

    /// Returns `true` if this is an authentication failure (maps to 401).
    #[must_use]
    pub fn is_authentication_error(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized { .. }
                | Self::InvalidToken { .. }
                | Self::TokenExpired
                | Self::TokenRevoked
        )
    }

    /// Returns `true` if this is an authorization failure (maps to 403).
    #[must_use]
    pub fn is_authorization_error(&self) -> bool {
        matches!(self, Self::Forbidden { .. })
    }

    /// Returns `true` if this is a server-side failure (maps to 500).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Storage { .. } | Self::Internal { .. })
    }
}

impl From<crate::jwt::JwtError> for AuthError {
    fn from(err: crate::jwt::JwtError) -> Self {
        use crate::jwt::JwtError;
        match err {
            JwtError::Expired => Self::TokenExpired,
            JwtError::InvalidSignature => Self::invalid_token("Invalid signature"),
            JwtError::TypeMismatch { expected, found } => Self::invalid_token(format!(
                "Expected a {expected} token, got {found}"
            )),
            JwtError::Encoding { message } => Self::internal(message),
            JwtError::Decoding { message } => Self::invalid_token(message),
        }
    }
}

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::unauthorized("Missing Authorization header");
        assert_eq!(
            err.to_string(),
            "Unauthorized: Missing Authorization header"
        );
        assert_eq!(AuthError::TokenExpired.to_string(), "Token expired");
    }

    #[test]
    fn test_error_predicates() {
        assert!(AuthError::TokenRevoked.is_authentication_error());
        assert!(AuthError::invalid_token("x").is_authentication_error());
        assert!(!AuthError::forbidden("x").is_authentication_error());
        assert!(AuthError::forbidden("x").is_authorization_error());
        assert!(AuthError::storage("db down").is_server_error());
    }

    #[test]
    fn test_jwt_error_conversion() {
        let err: AuthError = crate::jwt::JwtError::Expired.into();
        assert!(matches!(err, AuthError::TokenExpired));

        let err: AuthError = crate::jwt::JwtError::InvalidSignature.into();
        assert!(matches!(err, AuthError::InvalidToken { .. }));
    }
}

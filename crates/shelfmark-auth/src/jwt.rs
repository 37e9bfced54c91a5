//! JWT generation and validation.
//!
//! Two token classes, both HS256-signed with distinct secrets: short-lived
//! **access** tokens and long-lived **refresh** tokens. Claims carry the
//! user id (`sub`), the token class (`typ`), and the session id (`sid`)
//! that issued the pair, so logout can destroy the right session.

use std::fmt;
use std::time::Duration;

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    Encoding {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a token.
    #[error("Failed to decode token: {message}")]
    Decoding {
        /// Description of the decoding error.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    Expired,

    /// The token signature is invalid.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token carries the wrong `typ` claim for this operation.
    #[error("Expected a {expected} token, got {found}")]
    TypeMismatch {
        /// The class the caller asked to verify.
        expected: TokenClass,
        /// The class the token actually carries.
        found: String,
    },
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            _ => Self::Decoding {
                message: err.to_string(),
            },
        }
    }
}

// ============================================================================
// Token Class and Claims
// ============================================================================

/// The two bearer-token classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenClass {
    Access,
    Refresh,
}

impl TokenClass {
    /// The `typ` claim value for this class.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Claims carried by both token classes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    /// Subject: the user id.
    pub sub: String,

    /// Token class ("access" or "refresh").
    pub typ: String,

    /// Session id the pair was issued under.
    pub sid: String,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Expiration time (Unix timestamp).
    pub exp: i64,

    /// Unique token id, for log correlation.
    pub jti: String,
}

impl TokenClaims {
    /// Parses the subject claim into a user id.
    pub fn user_id(&self) -> Result<Uuid, JwtError> {
        Uuid::parse_str(&self.sub).map_err(|e| JwtError::Decoding {
            message: format!("Invalid subject claim: {e}"),
        })
    }
}

// ============================================================================
// JWT Service
// ============================================================================

/// Signs and verifies both token classes.
///
/// The access and refresh secrets are independent: a leaked refresh secret
/// cannot mint access tokens and vice versa.
pub struct JwtService {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl JwtService {
    /// Creates a service from the two signing secrets and lifetimes.
    #[must_use]
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    /// Lifetime configured for the given class.
    #[must_use]
    pub fn ttl(&self, class: TokenClass) -> Duration {
        match class {
            TokenClass::Access => self.access_ttl,
            TokenClass::Refresh => self.refresh_ttl,
        }
    }

    /// Issues a signed token of the given class.
    pub fn issue(
        &self,
        class: TokenClass,
        user_id: Uuid,
        session_id: &str,
    ) -> Result<String, JwtError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = TokenClaims {
            sub: user_id.to_string(),
            typ: class.as_str().to_string(),
            sid: session_id.to_string(),
            iat: now,
            exp: now + self.ttl(class).as_secs() as i64,
            jti: Uuid::new_v4().to_string(),
        };
        let key = match class {
            TokenClass::Access => &self.access_encoding,
            TokenClass::Refresh => &self.refresh_encoding,
        };
        encode(&Header::new(Algorithm::HS256), &claims, key).map_err(|e| JwtError::Encoding {
            message: e.to_string(),
        })
    }

    /// Verifies signature, expiry, and token class.
    pub fn verify(&self, class: TokenClass, token: &str) -> Result<TokenClaims, JwtError> {
        let key = match class {
            TokenClass::Access => &self.access_decoding,
            TokenClass::Refresh => &self.refresh_decoding,
        };
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        let data = decode::<TokenClaims>(token, key, &validation)?;
        if data.claims.typ != class.as_str() {
            return Err(JwtError::TypeMismatch {
                expected: class,
                found: data.claims.typ,
            });
        }
        Ok(data.claims)
    }

    /// Extracts the `exp` claim without verifying the signature.
    ///
    /// Used when blacklisting: a token presented for revocation may already
    /// fail full verification, but its natural expiry still bounds how long
    /// the blacklist entry must live. Returns `None` for undecodable input.
    #[must_use]
    pub fn decode_expiry_unverified(token: &str) -> Option<OffsetDateTime> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.set_required_spec_claims::<&str>(&[]);

        let data =
            decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation).ok()?;
        OffsetDateTime::from_unix_timestamp(data.claims.exp).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new(
            "access-secret-for-tests",
            "refresh-secret-for-tests",
            Duration::from_secs(900),
            Duration::from_secs(604_800),
        )
    }

    #[test]
    fn test_issue_and_verify_round_trip() {
        let svc = service();
        let user_id = Uuid::new_v4();
        let token = svc.issue(TokenClass::Access, user_id, "sess-1").unwrap();

        let claims = svc.verify(TokenClass::Access, &token).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.typ, "access");
        assert_eq!(claims.sid, "sess-1");
        assert_eq!(claims.user_id().unwrap(), user_id);
    }

    #[test]
    fn test_class_confusion_rejected() {
        let svc = service();
        let user_id = Uuid::new_v4();

        // A refresh token must not verify as an access token: even before
        // the typ check, the secrets differ.
        let refresh = svc.issue(TokenClass::Refresh, user_id, "sess-1").unwrap();
        assert!(svc.verify(TokenClass::Access, &refresh).is_err());

        // Same secret, wrong typ claim.
        let same_secret = JwtService::new(
            "shared-secret",
            "shared-secret",
            Duration::from_secs(900),
            Duration::from_secs(900),
        );
        let refresh = same_secret
            .issue(TokenClass::Refresh, user_id, "sess-1")
            .unwrap();
        let err = same_secret
            .verify(TokenClass::Access, &refresh)
            .unwrap_err();
        assert!(matches!(err, JwtError::TypeMismatch { .. }));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let svc = service();
        let other = JwtService::new(
            "different-access-secret",
            "different-refresh-secret",
            Duration::from_secs(900),
            Duration::from_secs(900),
        );
        let token = svc
            .issue(TokenClass::Access, Uuid::new_v4(), "sess-1")
            .unwrap();
        let err = other.verify(TokenClass::Access, &token).unwrap_err();
        assert!(matches!(err, JwtError::InvalidSignature));
    }

    #[test]
    fn test_expired_token_rejected() {
        let svc = JwtService::new(
            "access-secret-for-tests",
            "refresh-secret-for-tests",
            Duration::from_secs(0),
            Duration::from_secs(0),
        );
        let token = svc
            .issue(TokenClass::Access, Uuid::new_v4(), "sess-1")
            .unwrap();
        // exp == iat, and leeway is zero.
        std::thread::sleep(std::time::Duration::from_millis(1100));
        let err = svc.verify(TokenClass::Access, &token).unwrap_err();
        assert!(matches!(err, JwtError::Expired));
    }

    #[test]
    fn test_unverified_expiry_extraction() {
        let svc = service();
        let token = svc
            .issue(TokenClass::Refresh, Uuid::new_v4(), "sess-1")
            .unwrap();
        let exp = JwtService::decode_expiry_unverified(&token).unwrap();
        assert!(exp > OffsetDateTime::now_utc());

        assert!(JwtService::decode_expiry_unverified("not-a-jwt").is_none());
    }
}

//! Signed session tokens
//!
//! Session tokens are HS256-signed JWTs carrying a [`Claims`] payload. The
//! token doubles as the session lookup key, so every issued token carries a
//! random `jti` claim making it unique even when the same user logs in twice
//! within the same second.
//!
//! Token expiry mirrors the stored session expiry; the session store remains
//! authoritative, so verification here distinguishes an expired signature
//! from a forged or garbled one but never accepts a token the store has
//! already invalidated.

use chrono::Duration;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::User;

/// Claims embedded in every session token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject, the user's internal database id.
    pub sub: i64,
    /// The user's email at issue time.
    pub email: String,
    /// The user's role name (e.g. `"student"`, `"admin"`).
    pub role: String,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Unique token identifier (UUID v4).
    pub jti: String,
}

/// Errors from token verification.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// The signature is valid but the token has passed its expiry.
    #[error("Token has expired")]
    Expired,

    /// The token is malformed or its signature does not verify.
    #[error("Invalid token")]
    Invalid,

    /// Token could not be signed.
    #[error("Failed to sign token: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

/// Issues and verifies HS256-signed session tokens with a fixed secret
/// and lifetime.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    /// Create an issuer from an HMAC secret and a token lifetime.
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// The configured token lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Sign a new token for the given user.
    pub fn issue(&self, user: &User) -> Result<String, TokenError> {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role.to_string(),
            iat: now,
            exp: now + self.ttl.num_seconds(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(TokenError::Signing)
    }

    /// Verify a token's signature and expiry, returning the embedded claims.
    ///
    /// An expired-but-authentic token reports [`TokenError::Expired`];
    /// anything else that fails to verify reports [`TokenError::Invalid`].
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        match decode::<Claims>(token, &self.decoding_key, &Validation::default()) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(TokenError::Expired),
                _ => Err(TokenError::Invalid),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;

    fn test_user() -> User {
        let mut user = User::new(
            "student@example.com".to_string(),
            Some("hash".to_string()),
            UserRole::Student,
        );
        user.id = 42;
        user
    }

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("test-secret-long-enough-for-hmac", Duration::days(7))
    }

    #[test]
    fn test_issue_and_verify_round_trip() {
        let issuer = issuer();
        let token = issuer.issue(&test_user()).expect("issue should succeed");

        let claims = issuer.verify(&token).expect("verify should succeed");
        assert_eq!(claims.sub, 42);
        assert_eq!(claims.email, "student@example.com");
        assert_eq!(claims.role, "student");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_tokens_are_unique_per_issue() {
        let issuer = issuer();
        let user = test_user();
        let a = issuer.issue(&user).expect("issue should succeed");
        let b = issuer.issue(&user).expect("issue should succeed");
        assert_ne!(a, b, "jti must make repeated issues distinct");
    }

    #[test]
    fn test_expired_token_reports_expired() {
        // Expire well beyond the default 60-second leeway
        let issuer = TokenIssuer::new("test-secret-long-enough-for-hmac", Duration::seconds(-300));
        let token = issuer.issue(&test_user()).expect("issue should succeed");

        match issuer.verify(&token) {
            Err(TokenError::Expired) => {}
            other => panic!("Expected Expired, got {:?}", other.map(|c| c.sub)),
        }
    }

    #[test]
    fn test_garbage_token_reports_invalid() {
        let issuer = issuer();
        match issuer.verify("not.a.jwt") {
            Err(TokenError::Invalid) => {}
            other => panic!("Expected Invalid, got {:?}", other.map(|c| c.sub)),
        }
    }

    #[test]
    fn test_wrong_secret_reports_invalid() {
        let token = issuer().issue(&test_user()).expect("issue should succeed");
        let other = TokenIssuer::new("a-different-secret", Duration::days(7));
        assert!(matches!(other.verify(&token), Err(TokenError::Invalid)));
    }
}

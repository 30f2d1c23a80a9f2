//! RS256 session tokens.
//!
//! Tokens carry the user id as `sub` plus `iat`/`exp`. Only RS256 is
//! accepted when verifying, and expiry is checked without leeway.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shop_core::UserId;

use crate::config::JwtConfig;

const JWT_ALGORITHM: Algorithm = Algorithm::RS256;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,

    #[error("token expired")]
    Expired,

    #[error("invalid signing key: {0}")]
    Key(jsonwebtoken::errors::Error),

    #[error("token encoding failed: {0}")]
    Encode(jsonwebtoken::errors::Error),
}

/// Token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id as a string.
    pub sub: String,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Expiration (unix seconds).
    pub exp: i64,
}

impl Claims {
    /// The user the token was issued to.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Invalid` if `sub` is not a user id.
    pub fn user_id(&self) -> Result<UserId, TokenError> {
        self.sub.parse().map_err(|_| TokenError::Invalid)
    }
}

/// Signing and verification keys, parsed once at startup.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl JwtKeys {
    /// Parse the PEM keys from configuration.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Key` if either key is not a valid RSA PEM.
    pub fn from_config(config: &JwtConfig) -> Result<Self, TokenError> {
        Self::from_pem(
            config.private_key.expose_secret(),
            &config.public_key,
            Duration::days(config.expires_in_days),
        )
    }

    /// Parse PEM-encoded RSA keys.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Key` if either key is not a valid RSA PEM.
    pub fn from_pem(
        private_key_pem: &str,
        public_key_pem: &str,
        lifetime: Duration,
    ) -> Result<Self, TokenError> {
        let encoding = EncodingKey::from_rsa_pem(private_key_pem.as_bytes()).map_err(TokenError::Key)?;
        let decoding = DecodingKey::from_rsa_pem(public_key_pem.as_bytes()).map_err(TokenError::Key)?;
        Ok(Self {
            encoding,
            decoding,
            lifetime,
        })
    }

    /// Sign a token for `user`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Encode` if signing fails.
    pub fn issue(&self, user: UserId) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.to_string(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(&Header::new(JWT_ALGORITHM), claims, &self.encoding).map_err(TokenError::Encode)
    }

    /// Verify a token's signature and expiry.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` for expired tokens and
    /// `TokenError::Invalid` for anything else that fails verification.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(JWT_ALGORITHM);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub const PRIVATE_KEY: &str = include_str!("../../testdata/jwt_private.pem");
    pub const PUBLIC_KEY: &str = include_str!("../../testdata/jwt_public.pem");
    const OTHER_PUBLIC_KEY: &str = include_str!("../../testdata/other_public.pem");

    pub fn keys() -> JwtKeys {
        JwtKeys::from_pem(PRIVATE_KEY, PUBLIC_KEY, Duration::days(90)).unwrap()
    }

    #[test]
    fn test_issue_and_verify() {
        let keys = keys();
        let token = keys.issue(UserId::new(42)).unwrap();
        let claims = keys.verify(&token).unwrap();

        assert_eq!(claims.user_id().unwrap(), UserId::new(42));
        assert_eq!(claims.exp - claims.iat, 90 * 24 * 60 * 60);
    }

    #[test]
    fn test_expired_token() {
        let keys = keys();
        let now = Utc::now().timestamp();
        let token = keys
            .sign(&Claims {
                sub: "1".into(),
                iat: now - 120,
                exp: now - 60,
            })
            .unwrap();
        assert!(matches!(keys.verify(&token), Err(TokenError::Expired)));
    }

    #[test]
    fn test_wrong_key_rejected() {
        let token = keys().issue(UserId::new(1)).unwrap();
        let other =
            JwtKeys::from_pem(PRIVATE_KEY, OTHER_PUBLIC_KEY, Duration::days(1)).unwrap();
        assert!(matches!(other.verify(&token), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(keys().verify("not.a.token"), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_bad_subject() {
        let claims = Claims {
            sub: "abc".into(),
            iat: 0,
            exp: 0,
        };
        assert!(matches!(claims.user_id(), Err(TokenError::Invalid)));
    }

    #[test]
    fn test_bad_pem() {
        assert!(matches!(
            JwtKeys::from_pem("nope", PUBLIC_KEY, Duration::days(1)),
            Err(TokenError::Key(_))
        ));
    }
}

pub mod otp;
pub mod password;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{UserRole, UserType};

pub use otp::generate_otp;
pub use password::{hash_password, verify_password, PasswordError};

/// Longest token lifetime accepted, one year.
pub const MAX_TOKEN_HOURS: u64 = 24 * 365;

/// Token payload. `exp` is always present and validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub user_role: UserRole,
    pub user_type: UserType,
    pub platform: String,
    pub session_id: Uuid,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("Invalid JWT secret")]
    InvalidSecret,

    #[error("Token lifetime of {0} hours is out of range")]
    InvalidExpiry(u64),

    #[error("Token expired")]
    Expired,

    #[error("Invalid token: {0}")]
    Invalid(String),
}

/// Signs and validates HS256 tokens with a fixed lifetime.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, expiry_hours: u64) -> Result<Self, JwtError> {
        if secret.is_empty() {
            return Err(JwtError::InvalidSecret);
        }
        if !(1..=MAX_TOKEN_HOURS).contains(&expiry_hours) {
            return Err(JwtError::InvalidExpiry(expiry_hours));
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiry: Duration::hours(expiry_hours as i64),
        })
    }

    pub fn expiry(&self) -> Duration {
        self.expiry
    }

    pub fn claims(
        &self,
        user_id: Uuid,
        user_role: UserRole,
        user_type: UserType,
        platform: impl Into<String>,
        session_id: Uuid,
    ) -> Claims {
        let now = Utc::now();
        Claims {
            sub: user_id,
            user_role,
            user_type,
            platform: platform.into(),
            session_id,
            iat: now.timestamp(),
            exp: (now + self.expiry).timestamp(),
        }
    }

    pub fn issue(&self, claims: &Claims) -> Result<String, JwtError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| JwtError::TokenGeneration(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
                _ => JwtError::Invalid(e.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("test-secret", 1).unwrap()
    }

    #[test]
    fn issues_and_verifies() {
        let issuer = issuer();
        let claims = issuer.claims(Uuid::new_v4(), UserRole::Admin, UserType::Admin, "admin", Uuid::new_v4());
        let token = issuer.issue(&claims).unwrap();
        assert_eq!(issuer.verify(&token).unwrap(), claims);
    }

    #[test]
    fn rejects_expired_token() {
        let issuer = issuer();
        let mut claims = issuer.claims(Uuid::new_v4(), UserRole::User, UserType::User, "web", Uuid::new_v4());
        claims.exp = Utc::now().timestamp() - 60;
        let token = issuer.issue(&claims).unwrap();
        assert!(matches!(issuer.verify(&token), Err(JwtError::Expired)));
    }

    #[test]
    fn rejects_foreign_signature() {
        let claims = issuer().claims(Uuid::new_v4(), UserRole::User, UserType::User, "web", Uuid::new_v4());
        let token = TokenIssuer::new("other-secret", 1).unwrap().issue(&claims).unwrap();
        assert!(matches!(issuer().verify(&token), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn empty_secret_is_refused() {
        assert!(matches!(TokenIssuer::new("", 1), Err(JwtError::InvalidSecret)));
    }

    #[test]
    fn lifetime_out_of_range_is_refused() {
        assert!(matches!(TokenIssuer::new("s", 0), Err(JwtError::InvalidExpiry(0))));
        assert!(matches!(TokenIssuer::new("s", u64::MAX), Err(JwtError::InvalidExpiry(_))));
        assert!(matches!(TokenIssuer::new("s", MAX_TOKEN_HOURS + 1), Err(JwtError::InvalidExpiry(_))));
        assert!(TokenIssuer::new("s", MAX_TOKEN_HOURS).is_ok());
    }
}

//! Session token signing/verification (HS256).

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;

use crate::claims::{SessionClaims, TokenValidationError, validate_claims};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("token signing failed: {0}")]
    Signing(String),

    #[error("invalid token")]
    InvalidToken,

    #[error(transparent)]
    Claims(#[from] TokenValidationError),

    #[error("password hashing failed: {0}")]
    Hashing(String),
}

/// Session token contract: sign claims into an opaque string, verify a string
/// back into claims.
pub trait TokenSigner: Send + Sync {
    fn sign(&self, claims: &SessionClaims) -> Result<String, AuthError>;

    /// Decode, check the signature, and validate the claim time window
    /// against `now`.
    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, AuthError>;
}

impl<T: TokenSigner + ?Sized> TokenSigner for std::sync::Arc<T> {
    fn sign(&self, claims: &SessionClaims) -> Result<String, AuthError> {
        (**self).sign(claims)
    }

    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, AuthError> {
        (**self).verify(token, now)
    }
}

/// HS256 signer over a shared secret.
pub struct Hs256TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl Hs256TokenSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        // Claim validation (expiry window) is done by `validate_claims` so the
        // claims can stay RFC3339 timestamps instead of numeric `exp`/`iat`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        Self {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl TokenSigner for Hs256TokenSigner {
    fn sign(&self, claims: &SessionClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, AuthError> {
        let data = decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map_err(|_| AuthError::InvalidToken)?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jobhub_core::UserId;

    #[test]
    fn sign_verify_round_trip() {
        let signer = Hs256TokenSigner::new("test-secret");
        let now = Utc::now();
        let claims = SessionClaims::for_user(UserId::new(), now, Duration::minutes(30));

        let token = signer.sign(&claims).unwrap();
        let verified = signer.verify(&token, now).unwrap();
        assert_eq!(verified.sub, claims.sub);
    }

    #[test]
    fn expired_token_is_rejected() {
        let signer = Hs256TokenSigner::new("test-secret");
        let now = Utc::now();
        let claims = SessionClaims::for_user(UserId::new(), now - Duration::hours(2), Duration::minutes(30));

        let token = signer.sign(&claims).unwrap();
        assert!(matches!(
            signer.verify(&token, now),
            Err(AuthError::Claims(TokenValidationError::Expired))
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let signer = Hs256TokenSigner::new("secret-a");
        let other = Hs256TokenSigner::new("secret-b");
        let now = Utc::now();
        let claims = SessionClaims::for_user(UserId::new(), now, Duration::minutes(30));

        let token = signer.sign(&claims).unwrap();
        assert!(matches!(other.verify(&token, now), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn garbage_token_is_rejected() {
        let signer = Hs256TokenSigner::new("test-secret");
        assert!(matches!(
            signer.verify("not.a.token", Utc::now()),
            Err(AuthError::InvalidToken)
        ));
    }
}

//! Onboarding error taxonomy.
//!
//! A closed set of tagged variants; the API boundary maps each one to a fixed
//! HTTP status and machine code.

use thiserror::Error;

use jobhub_auth::AuthError;

use crate::email::EmailError;
use crate::store::{OtpStoreError, UserStoreError};

/// Field-level validation detail surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OnboardingError {
    /// Malformed input, with per-field detail.
    #[error("validation failed")]
    Validation(Vec<FieldError>),

    /// Too many OTP issuances/resends.
    #[error("too many OTP requests")]
    RateLimited { retry_after_secs: i64 },

    /// OTP mismatch, expiry, or attempt exhaustion — deliberately
    /// undifferentiated so callers cannot tell which condition failed.
    #[error("invalid or expired OTP")]
    InvalidOrExpiredCode,

    /// Signup against an already-verified email.
    #[error("email already exists")]
    EmailInUse,

    /// Login failure — uniform for unknown email and bad password.
    #[error("invalid email or password")]
    WrongCredentials,

    /// Email dispatch failed; propagated, never retried internally.
    #[error("email delivery failed: {0}")]
    Delivery(String),

    #[error("auth primitive failed: {0}")]
    Auth(String),

    #[error("storage error: {0}")]
    Store(String),
}

impl From<EmailError> for OnboardingError {
    fn from(e: EmailError) -> Self {
        match e {
            EmailError::Dispatch(msg) => Self::Delivery(msg),
        }
    }
}

impl From<AuthError> for OnboardingError {
    fn from(e: AuthError) -> Self {
        Self::Auth(e.to_string())
    }
}

impl From<OtpStoreError> for OnboardingError {
    fn from(e: OtpStoreError) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<UserStoreError> for OnboardingError {
    fn from(e: UserStoreError) -> Self {
        Self::Store(e.to_string())
    }
}

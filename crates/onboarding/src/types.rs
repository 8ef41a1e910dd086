//! Core onboarding records and OTP code helpers.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use jobhub_core::{DomainError, UserId};

/// Unique identifier of an OTP challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChallengeId(pub Uuid);

impl ChallengeId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ChallengeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChallengeId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::from_str(s)
            .map_err(|e| DomainError::invalid_id(format!("ChallengeId: {e}")))?;
        Ok(Self(uuid))
    }
}

/// OTP challenge lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OtpStatus {
    /// Outstanding, waiting for a verify attempt
    Pending,
    /// Consumed by a successful verify; immutable afterward
    Used,
    /// Discarded (dispatch failure) or aged out
    Expired,
    /// Failed-attempt budget exhausted
    Blocked,
}

/// One outstanding or historical verification attempt.
///
/// # Invariants
/// - Only the hash of the code is ever stored, never the plaintext.
/// - The Pending → Used transition happens in a single conditional store
///   write; a challenge is immutable once Used.
/// - Expired rows are eligible for passive TTL cleanup by the store and must
///   never be matched by verify.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpChallenge {
    pub id: ChallengeId,
    pub user_id: UserId,
    pub code_hash: String,
    pub expires_at: DateTime<Utc>,
    /// Failed verification attempts so far.
    pub attempts: u32,
    /// Cap on failed verification attempts.
    pub max_attempts: u32,
    /// Times a code has been (re)sent for this challenge lineage.
    pub send_attempts: u32,
    pub status: OtpStatus,
    pub created_at: DateTime<Utc>,
}

impl OtpChallenge {
    pub fn new(
        user_id: UserId,
        code_hash: String,
        expires_at: DateTime<Utc>,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ChallengeId::new(),
            user_id,
            code_hash,
            expires_at,
            attempts: 0,
            max_attempts,
            send_attempts: 1,
            status: OtpStatus::Pending,
            created_at: now,
        }
    }

    /// A challenge that verify could still accept.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == OtpStatus::Pending && self.expires_at > now
    }
}

/// Identity record.
///
/// The password hash is redacted from every serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    /// Case-normalized, unique.
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    #[serde(default)]
    pub password_hash: String,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(email: String, name: String, password_hash: String, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            email,
            name,
            password_hash,
            email_verified: false,
            created_at: now,
        }
    }
}

/// Trim and lowercase an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Generate a uniformly random 6-digit code, leading zeros preserved.
pub fn generate_code() -> String {
    format_code(rand::thread_rng().gen_range(0..=999_999))
}

pub(crate) fn format_code(n: u32) -> String {
    format!("{n:06}")
}

/// One-way hash of an OTP code (SHA-256, hex).
pub fn hash_code(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

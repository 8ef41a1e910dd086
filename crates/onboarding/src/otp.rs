//! OTP challenge engine: issue, resend, verify.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use jobhub_core::UserId;

use crate::email::EmailSender;
use crate::error::OnboardingError;
use crate::store::OtpStore;
use crate::types::{ChallengeId, OtpChallenge, generate_code, hash_code};

/// Engine policy knobs.
#[derive(Debug, Clone)]
pub struct OtpConfig {
    /// How long a code stays valid.
    pub code_ttl: Duration,
    /// Resends allowed on one live challenge beyond the initial send.
    pub max_resends: u32,
    /// Cap on failed verification attempts per challenge.
    pub max_failed_attempts: u32,
    /// Challenges that may be created per user inside a rolling hour.
    pub hourly_issue_limit: usize,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            code_ttl: Duration::minutes(5),
            max_resends: 2,
            max_failed_attempts: 5,
            hourly_issue_limit: 3,
        }
    }
}

/// Result of issuing or resending a code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedChallenge {
    pub challenge_id: ChallengeId,
    pub expires_at: DateTime<Utc>,
}

/// Issues, resends, and verifies one-time codes.
///
/// The engine holds no state of its own: everything that crosses a request
/// boundary lives in the store, and the caller supplies `now`.
pub struct OtpEngine<S: OtpStore, M: EmailSender> {
    store: S,
    mailer: M,
    config: OtpConfig,
}

impl<S: OtpStore, M: EmailSender> OtpEngine<S, M> {
    pub fn new(store: S, mailer: M, config: OtpConfig) -> Self {
        Self {
            store,
            mailer,
            config,
        }
    }

    /// Enforce the rolling-hour issuance budget for a user.
    ///
    /// Checked before any code is generated; also re-run by the signup
    /// orchestration on the resend path.
    pub fn check_hourly_budget(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), OnboardingError> {
        let created = self
            .store
            .count_created_since(user_id, now - Duration::hours(1))?;

        if created >= self.config.hourly_issue_limit {
            debug!(%user_id, created, "OTP issuance budget exhausted");
            return Err(OnboardingError::RateLimited {
                retry_after_secs: 3600,
            });
        }
        Ok(())
    }

    /// Create a fresh challenge and dispatch its code.
    ///
    /// If dispatch fails the challenge is retired before the error is
    /// returned, so no challenge the user never received stays verifiable;
    /// the caller may simply retry issuance.
    pub fn issue(
        &self,
        user_id: UserId,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedChallenge, OnboardingError> {
        self.check_hourly_budget(user_id, now)?;

        let code = generate_code();
        let challenge = OtpChallenge::new(
            user_id,
            hash_code(&code),
            now + self.config.code_ttl,
            self.config.max_failed_attempts,
            now,
        );
        let issued = IssuedChallenge {
            challenge_id: challenge.id,
            expires_at: challenge.expires_at,
        };
        self.store.create(challenge)?;

        if let Err(e) = self.dispatch_code(email, &code) {
            // Retire the challenge; best-effort, the row also ages out by TTL.
            if let Err(discard_err) = self.store.discard(issued.challenge_id) {
                warn!(error = %discard_err, "failed to discard undeliverable challenge");
            }
            return Err(e.into());
        }

        debug!(%user_id, challenge_id = %issued.challenge_id, "OTP issued");
        Ok(issued)
    }

    /// Resend a code for the user's live challenge, or issue a fresh one when
    /// none is live.
    pub fn resend(
        &self,
        user_id: UserId,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedChallenge, OnboardingError> {
        let latest = self.store.find_latest_for_user(user_id)?;

        let live = match latest {
            Some(c) if c.is_live(now) => c,
            _ => return self.issue(user_id, email, now),
        };

        if live.send_attempts > self.config.max_resends {
            debug!(%user_id, challenge_id = %live.id, "resend budget exhausted");
            return Err(OnboardingError::RateLimited {
                retry_after_secs: (live.expires_at - now).num_seconds().max(0),
            });
        }

        let code = generate_code();
        let refreshed = self.store.refresh_pending(
            live.id,
            &hash_code(&code),
            now + self.config.code_ttl,
        )?;

        let challenge = match refreshed {
            Some(c) => c,
            // Lost a race with a concurrent verify; start over with a fresh
            // challenge.
            None => return self.issue(user_id, email, now),
        };

        self.dispatch_code(email, &code)?;

        debug!(%user_id, challenge_id = %challenge.id, send_attempts = challenge.send_attempts, "OTP resent");
        Ok(IssuedChallenge {
            challenge_id: challenge.id,
            expires_at: challenge.expires_at,
        })
    }

    /// Verify a candidate code against a challenge.
    ///
    /// One atomic conditional store write does the matching and the
    /// Pending → Used flip; two concurrent verifies (or a verify racing a
    /// resend) can therefore never both succeed. On a miss the failed-attempt
    /// counter is bumped best-effort and a single undifferentiated error is
    /// returned.
    pub fn verify(
        &self,
        challenge_id: ChallengeId,
        candidate_code: &str,
        now: DateTime<Utc>,
    ) -> Result<UserId, OnboardingError> {
        let matched =
            self.store
                .transition_to_used(challenge_id, &hash_code(candidate_code), now)?;

        match matched {
            Some(challenge) => {
                debug!(challenge_id = %challenge_id, user_id = %challenge.user_id, "OTP verified");
                Ok(challenge.user_id)
            }
            None => {
                if let Err(e) = self.store.record_failed_attempt(challenge_id) {
                    warn!(challenge_id = %challenge_id, error = %e, "failed to record OTP attempt");
                }
                Err(OnboardingError::InvalidOrExpiredCode)
            }
        }
    }

    fn dispatch_code(&self, email: &str, code: &str) -> Result<(), crate::email::EmailError> {
        let minutes = self.config.code_ttl.num_minutes();
        self.mailer.send(
            email,
            "Your verification code",
            &format!("<p>Your verification code is <b>{code}</b>. It expires in {minutes} minutes.</p>"),
        )
    }
}
